//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Token colours and UI colours, One Dark unless a theme file overrides them.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Token colours (index 0..=5): green, yellow, red, blue, magenta, cyan.
    pub tokens: [Color; 6],
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, moves).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text and the cursor cell background.
    pub inactive_fg: Color,
    /// Background of the selected cell.
    pub selected_bg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

// One Dark values from onedark.theme.
const GREEN: Color = Color::Rgb(0x98, 0xC3, 0x79);
const YELLOW: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const RED: Color = Color::Rgb(0xE0, 0x6C, 0x75);
const BLUE: Color = Color::Rgb(0x61, 0xAF, 0xEF);
const MAGENTA: Color = Color::Rgb(0xC6, 0x78, 0xDD);
const CYAN: Color = Color::Rgb(0x56, 0xB6, 0xC2);
const METER_BG: Color = Color::Rgb(0x31, 0x35, 0x3F);
const DIV_LINE: Color = Color::Rgb(0x3F, 0x44, 0x4F);
const MAIN_FG: Color = Color::Rgb(0xAB, 0xB2, 0xBF);
const INACTIVE_FG: Color = Color::Rgb(0x5C, 0x63, 0x70);
const SELECTED_BG: Color = Color::Rgb(0x4B, 0x52, 0x63);

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tokens: [GREEN, YELLOW, RED, BLUE, MAGENTA, CYAN],
            bg: METER_BG,
            div_line: DIV_LINE,
            main_fg: MAIN_FG,
            title: YELLOW,
            inactive_fg: INACTIVE_FG,
            selected_bg: SELECTED_BG,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override token colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.tokens = [
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0xFF),
                ];
            }
            Palette::Colorblind => {
                // Tol bright scheme, no red/green pair
                self.tokens = [
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0xCC, 0x33, 0x11),
                    Color::Rgb(0xEE, 0x33, 0x77),
                    Color::Rgb(0xBB, 0xBB, 0x00),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        // Keys match onedark.theme.
        Self {
            tokens: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(GREEN),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(YELLOW),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(RED),
                get("cpu_box").unwrap_or(BLUE),
                get("net_box").unwrap_or(MAGENTA),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(CYAN),
            ],
            bg: get("meter_bg").unwrap_or(METER_BG),
            div_line: get("div_line").unwrap_or(DIV_LINE),
            main_fg: get("main_fg").unwrap_or(MAIN_FG),
            title: get("title").unwrap_or(YELLOW),
            inactive_fg: get("inactive_fg").unwrap_or(INACTIVE_FG),
            selected_bg: get("selected_bg").unwrap_or(SELECTED_BG),
        }
    }

    /// Colour for a token colour index.
    #[inline]
    pub fn token_color(&self, index: u8) -> Color {
        self.tokens[usize::from(index) % self.tokens.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
