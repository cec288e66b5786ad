//! Match-three engine: board model, match detection, special tokens, gravity and the cascade loop.
//!
//! Every pipeline stage takes the board as an explicit value and hands back a new one (or a set
//! of positions); only [`Engine`] commits a board.

mod activation;
mod config;
mod engine;
mod gravity;
mod grid;
mod matcher;
mod specials;

pub use config::EngineConfig;
pub use engine::{Engine, Outcome, Phase, SessionSummary, SwapOutcome};
pub use grid::{Pos, Special, Token};
