//! Persist the local best score to disk (XDG config or ~/.config/gemtui).

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

const FILENAME: &str = "highscore";

/// Returns the path to the high score file (config dir / gemtui / highscore).
fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("gemtui").join(FILENAME)
}

/// First line as a score; 0 when missing or malformed.
fn parse_best(content: &str) -> u64 {
    content
        .lines()
        .next()
        .and_then(|l| l.trim().parse().ok())
        .unwrap_or(0)
}

/// Load the best score from disk. 0 on missing file or parse error.
pub fn load_best() -> u64 {
    fs::read_to_string(config_path())
        .map(|c| parse_best(&c))
        .unwrap_or(0)
}

/// Save the best score to disk. Creates config directory if needed.
pub fn save_best(score: u64) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{score}\n"))?;
    Ok(())
}
