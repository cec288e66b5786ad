//! Gemtui: match-three tile puzzle with special tokens and cascades in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod logging;
mod report;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use game::EngineConfig;
use report::{Identity, JsonLinesSink, Reporter, ScoreSink};
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;
    let config = args.engine_config();
    config.validate()?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "theme load failed, using defaults");
        theme::Theme::default()
    });
    let sink = args
        .report_file
        .clone()
        .map(|path| Box::new(JsonLinesSink::new(path)) as Box<dyn ScoreSink>);
    let reporter = Reporter::new(Identity::from_user_id(args.user_id.clone()), sink);
    let time_limit = (args.time_limit > 0).then(|| Duration::from_secs(args.time_limit));
    let mut app = App::new(config, theme, reporter, time_limit);
    app.run()?;
    Ok(())
}

/// Match-three tile puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "gemtui",
    version,
    about = "Match-three puzzle in the terminal. Swap neighbouring tokens to line up three or more of a colour.",
    long_about = "Gemtui is a terminal match-three puzzle.\n\n\
        Swap two neighbouring tokens to line up three or more of one colour. Longer lines and \
        T/L shapes leave special tokens behind: striped (clears a row or column), wrapped \
        (clears a 3x3 block) and colour bombs (clear every token of one colour).\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor (swap when a token is selected)\n  \
        Space/Enter    Select / swap with selection   Esc  Drop selection\n  \
        P              Pause    R  Restart    Q  Quit\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board size (rows and columns).
    #[arg(short, long, default_value = "8", value_name = "N")]
    pub size: usize,

    /// Number of token colours (3-6).
    #[arg(short, long, default_value = "6", value_name = "N")]
    pub colors: u8,

    /// Moves per session.
    #[arg(short, long, default_value = "30", value_name = "N")]
    pub moves: u32,

    /// Session time limit in seconds (0 disables the timer).
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub time_limit: u64,

    /// Seed for reproducible boards.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Disable animations (every cascade step resolves instantly).
    #[arg(long)]
    pub no_animation: bool,

    /// Pause between a committed swap and the first clear.
    #[arg(long, default_value = "150", value_name = "MS")]
    pub swap_delay_ms: u64,

    /// How long cleared cells stay empty before tokens fall.
    #[arg(long, default_value = "300", value_name = "MS")]
    pub clear_delay_ms: u64,

    /// Pause after tokens fall, before the next clear.
    #[arg(long, default_value = "150", value_name = "MS")]
    pub fall_delay_ms: u64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Player id. Scores are only reported for signed-in players.
    #[arg(long, value_name = "ID")]
    pub user_id: Option<String>,

    /// Append session reports (JSON lines) to this file.
    #[arg(long, value_name = "FILE")]
    pub report_file: Option<PathBuf>,

    /// Write logs to this file (level via RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Final score needed for a session to count as a win.
    #[arg(long, default_value = "600", value_name = "POINTS")]
    pub win_threshold: u64,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig {
            grid_size: self.size,
            color_count: self.colors,
            max_moves: self.moves,
            seed: self.seed,
            swap_delay: Duration::from_millis(self.swap_delay_ms),
            clear_delay: Duration::from_millis(self.clear_delay_ms),
            fall_delay: Duration::from_millis(self.fall_delay_ms),
            win_threshold: self.win_threshold,
            ..EngineConfig::default()
        };
        if self.no_animation {
            config.without_delays()
        } else {
            config
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
