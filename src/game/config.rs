//! Fixed per-session engine configuration.

use std::time::Duration;
use thiserror::Error;

/// Palette size supported by the renderer's theme.
pub const MAX_COLORS: u8 = 6;
const MIN_COLORS: u8 = 3;
const MIN_GRID_SIZE: usize = 3;
const MAX_GRID_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid size {0} is outside 3..=16")]
    GridSize(usize),
    #[error("colour count {0} is outside 3..=6")]
    ColorCount(u8),
    #[error("a session needs at least one move")]
    NoMoves,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub grid_size: usize,
    pub color_count: u8,
    /// Moves granted at session start.
    pub max_moves: u32,
    /// Seed for the board RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Suspension between a committed swap and the first resolving pass.
    pub swap_delay: Duration,
    /// Suspension while removed cells are shown empty, before gravity.
    pub clear_delay: Duration,
    /// Suspension after gravity, before the next resolving pass.
    pub fall_delay: Duration,
    pub points_per_token: u64,
    /// Multiplier applied to cells removed by a special-token activation.
    pub activation_multiplier: u64,
    /// Fix-up passes allowed when clearing runs from a fresh board.
    pub init_retry_budget: u32,
    /// Resolving passes allowed per cascade before force-settling.
    pub max_cascade_passes: u32,
    /// Final score at or above this counts as a win. The default of 600 is sixty tokens at
    /// the base rate, two per move over a full session.
    pub win_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: 8,
            color_count: MAX_COLORS,
            max_moves: 30,
            seed: None,
            swap_delay: Duration::from_millis(150),
            clear_delay: Duration::from_millis(300),
            fall_delay: Duration::from_millis(150),
            points_per_token: 10,
            activation_multiplier: 2,
            init_retry_budget: 50,
            max_cascade_passes: 64,
            win_threshold: 600,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.grid_size) {
            return Err(ConfigError::GridSize(self.grid_size));
        }
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.color_count) {
            return Err(ConfigError::ColorCount(self.color_count));
        }
        if self.max_moves == 0 {
            return Err(ConfigError::NoMoves);
        }
        Ok(())
    }

    /// Same configuration with every scheduled suspension collapsed to zero.
    pub fn without_delays(mut self) -> Self {
        self.swap_delay = Duration::ZERO;
        self.clear_delay = Duration::ZERO;
        self.fall_delay = Duration::ZERO;
        self
    }
}
