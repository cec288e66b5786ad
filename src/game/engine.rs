//! Cascade controller: swap protocol, resolve/settle loop, scoring and session lifecycle.
//!
//! The engine is step-driven. Every suspension between phases is a scheduled continuation that
//! fires from [`Engine::tick`] once due, or immediately from [`Engine::step`]. At most one swap or
//! cascade is in flight: swap requests outside [`Phase::Idle`] are refused.

use super::activation::blast_radius;
use super::config::EngineConfig;
use super::gravity;
use super::grid::{Grid, Pos, Special, SwapError, Token};
use super::matcher::find_matches;
use super::specials::resolve_candidates;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Swapping,
    Resolving,
    Settling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Swapping => "swapping",
            Self::Resolving => "resolving",
            Self::Settling => "settling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Swap kept; a cascade is now in flight and one move was spent.
    Committed,
    /// Colour bomb fired in place; a cascade is now in flight and one move was spent.
    Detonated,
    /// No match and no special involved: board unchanged, no move spent.
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

/// Final result handed to the reporting side, produced once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub final_score: u64,
    pub moves_used: u32,
    pub outcome: Outcome,
}

/// Scheduled "animation finished" callback. `session` is the cancellation token: a restart bumps
/// the engine's session and any older continuation is dropped unfired.
#[derive(Debug, Clone, Copy)]
struct Continuation {
    due: Instant,
    next: Phase,
    session: u64,
}

type StateObserver = Box<dyn FnMut(Phase, u64, &Grid)>;

pub struct Engine {
    config: EngineConfig,
    rng: StdRng,
    grid: Grid,
    phase: Phase,
    score: u64,
    moves_left: u32,
    /// Activation cells from special swap endpoints, unioned into the next resolving pass.
    pending_blast: BTreeSet<Pos>,
    /// Cells emptied by the current suspension, for the renderer.
    pending_removal: BTreeSet<Pos>,
    passes: u32,
    continuation: Option<Continuation>,
    session: u64,
    end_requested: bool,
    summary: Option<SessionSummary>,
    summary_taken: bool,
    observer: Option<StateObserver>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.phase)
            .field("score", &self.score)
            .field("moves_left", &self.moves_left)
            .field("session", &self.session)
            .field("grid", &self.grid)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let grid = Grid::generate(
            config.grid_size,
            config.color_count,
            config.init_retry_budget,
            &mut rng,
        );
        info!(
            size = config.grid_size,
            colors = config.color_count,
            moves = config.max_moves,
            seed = ?config.seed,
            "session started"
        );
        Self {
            moves_left: config.max_moves,
            config,
            rng,
            grid,
            phase: Phase::Idle,
            score: 0,
            pending_blast: BTreeSet::new(),
            pending_removal: BTreeSet::new(),
            passes: 0,
            continuation: None,
            session: 0,
            end_requested: false,
            summary: None,
            summary_taken: false,
            observer: None,
        }
    }

    /// Start a fresh session on a new board. Any in-flight continuation is discarded.
    pub fn restart(&mut self) {
        self.session += 1;
        self.grid = Grid::generate(
            self.config.grid_size,
            self.config.color_count,
            self.config.init_retry_budget,
            &mut self.rng,
        );
        self.score = 0;
        self.moves_left = self.config.max_moves;
        self.pending_blast.clear();
        self.pending_removal.clear();
        self.passes = 0;
        self.continuation = None;
        self.end_requested = false;
        self.summary = None;
        self.summary_taken = false;
        info!(session = self.session, "session restarted");
        self.enter(Phase::Idle);
    }

    /// Register the transition callback, fired with (phase, score, board) after every change.
    pub fn on_state_change(&mut self, observer: impl FnMut(Phase, u64, &Grid) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pending_removal(&self) -> &BTreeSet<Pos> {
        &self.pending_removal
    }

    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    /// Attempt to swap two cells.
    ///
    /// Invalid requests are refused with no state change. A colour bomb endpoint fires in place;
    /// otherwise the swap is tried on a copy and committed only if it forms a match or moves a
    /// special token.
    pub fn request_swap(&mut self, a: Pos, b: Pos, now: Instant) -> Result<SwapOutcome, SwapError> {
        if self.phase != Phase::Idle {
            debug!(phase = %self.phase, "swap ignored while busy");
            return Err(SwapError::Busy);
        }
        if self.end_requested {
            return Err(SwapError::SessionOver);
        }
        if self.moves_left == 0 {
            return Err(SwapError::NoMovesLeft);
        }
        let swapped = self.grid.swapped(a, b)?;
        let (Some(ta), Some(tb)) = (self.grid.get(a), self.grid.get(b)) else {
            return Err(SwapError::Busy);
        };
        self.enter(Phase::Swapping);

        if ta.special == Special::ColorBomb || tb.special == Special::ColorBomb {
            let removal = self.bomb_removal(a, ta, b, tb);
            self.spend_move();
            self.award(0, removal.len());
            for pos in &removal {
                self.grid.set(*pos, None);
            }
            debug!(cleared = removal.len(), score = self.score, "colour bomb detonated");
            self.pending_removal = removal;
            self.schedule(Phase::Settling, self.config.clear_delay, now);
            self.notify();
            return Ok(SwapOutcome::Detonated);
        }

        let report = find_matches(&swapped);
        let blast: BTreeSet<Pos> = [a, b]
            .into_iter()
            .filter(|&p| swapped.get(p).is_some_and(|t| t.special.is_special()))
            .flat_map(|p| blast_radius(&swapped, p, None))
            .collect();
        let special_moved = ta.special.is_special() || tb.special.is_special();
        if report.is_empty() && !special_moved {
            debug!(?a, ?b, "swap reverted");
            self.enter(Phase::Idle);
            return Ok(SwapOutcome::Reverted);
        }

        self.grid = swapped;
        self.spend_move();
        self.pending_blast = blast;
        self.schedule(Phase::Resolving, self.config.swap_delay, now);
        self.notify();
        Ok(SwapOutcome::Committed)
    }

    /// A bomb clears every token of its partner's colour. A second bomb does the same with the
    /// first bomb's colour; a striped or wrapped partner fires its own blast too.
    fn bomb_removal(&self, a: Pos, ta: Token, b: Pos, tb: Token) -> BTreeSet<Pos> {
        let mut removal = BTreeSet::new();
        for (pos, token, partner) in [(a, ta, tb), (b, tb, ta)] {
            match token.special {
                Special::ColorBomb => {
                    removal.insert(pos);
                    removal.extend(blast_radius(&self.grid, pos, Some(partner.color)));
                }
                Special::Normal => {}
                _ => removal.extend(blast_radius(&self.grid, pos, None)),
            }
        }
        removal
    }

    /// Fire every continuation that is due by `now`. Returns true if anything fired.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut fired = false;
        while self.continuation.is_some_and(|c| c.due <= now) {
            self.fire(now);
            fired = true;
        }
        fired
    }

    /// Fire the pending continuation without waiting for it to fall due.
    pub fn step(&mut self, now: Instant) -> bool {
        if self.continuation.is_none() {
            return false;
        }
        self.fire(now);
        true
    }

    /// Drive the in-flight cascade to Idle, ignoring delays.
    pub fn run_until_idle(&mut self) {
        let now = Instant::now();
        while self.step(now) {}
    }

    fn fire(&mut self, now: Instant) {
        let Some(continuation) = self.continuation.take() else {
            return;
        };
        if continuation.session != self.session {
            return;
        }
        match continuation.next {
            Phase::Resolving => self.resolve(now),
            Phase::Settling => self.settle(now),
            Phase::Idle | Phase::Swapping => {}
        }
    }

    fn schedule(&mut self, next: Phase, delay: Duration, now: Instant) {
        self.continuation = Some(Continuation {
            due: now + delay,
            next,
            session: self.session,
        });
    }

    /// One resolving pass: detect, promote, remove, score.
    fn resolve(&mut self, now: Instant) {
        self.passes += 1;
        if self.passes > self.config.max_cascade_passes {
            warn!(passes = self.passes, "cascade ceiling reached, force-settling");
            self.pending_blast.clear();
            self.apply_gravity();
            self.finish_cascade();
            return;
        }

        let report = find_matches(&self.grid);
        let blast = std::mem::take(&mut self.pending_blast);
        if report.is_empty() && blast.is_empty() {
            self.finish_cascade();
            return;
        }

        let promotions = resolve_candidates(&report.candidates, &report.runs);
        let removal: BTreeSet<Pos> = report
            .matched
            .union(&blast)
            .filter(|p| !promotions.contains_key(p))
            .copied()
            .collect();
        for (pos, kind) in &promotions {
            self.grid.promote(*pos, *kind);
        }
        let activated = removal.intersection(&blast).count();
        self.award(removal.len() - activated, activated);
        for pos in &removal {
            self.grid.set(*pos, None);
        }
        debug!(
            pass = self.passes,
            runs = report.runs.len(),
            colors = ?report.runs.iter().map(|r| r.color).collect::<BTreeSet<_>>(),
            promoted = promotions.len(),
            removed = removal.len(),
            score = self.score,
            "resolving pass"
        );
        self.pending_removal = removal;
        self.enter(Phase::Resolving);
        self.schedule(Phase::Settling, self.config.clear_delay, now);
    }

    fn settle(&mut self, now: Instant) {
        self.apply_gravity();
        self.pending_removal.clear();
        self.enter(Phase::Settling);
        self.schedule(Phase::Resolving, self.config.fall_delay, now);
    }

    fn apply_gravity(&mut self) {
        let settled = gravity::settle(self.grid.clone(), self.config.color_count, &mut self.rng);
        debug!(refilled = settled.refilled, repaired = settled.repaired, "tokens settled");
        self.grid = settled.grid;
    }

    fn finish_cascade(&mut self) {
        self.passes = 0;
        self.pending_removal.clear();
        self.enter(Phase::Idle);
        if self.end_requested {
            self.finalize();
        }
    }

    fn spend_move(&mut self) {
        self.moves_left = self.moves_left.saturating_sub(1);
    }

    fn award(&mut self, plain: usize, activated: usize) {
        let per = self.config.points_per_token;
        self.score += plain as u64 * per + activated as u64 * per * self.config.activation_multiplier;
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, score = self.score, "phase change");
        }
        self.phase = phase;
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(self.phase, self.score, &self.grid);
        }
    }

    /// Ask for the session to end. Deferred until the in-flight cascade reaches Idle; the summary
    /// then becomes available from [`Engine::take_summary`].
    pub fn end_session(&mut self) {
        if self.end_requested {
            return;
        }
        self.end_requested = true;
        info!(phase = %self.phase, score = self.score, "session end requested");
        if self.phase == Phase::Idle {
            self.finalize();
        }
    }

    fn finalize(&mut self) {
        if self.summary.is_some() {
            return;
        }
        let outcome = if self.score >= self.config.win_threshold {
            Outcome::Win
        } else {
            Outcome::Lose
        };
        let summary = SessionSummary {
            final_score: self.score,
            moves_used: self.config.max_moves - self.moves_left,
            outcome,
        };
        info!(
            score = summary.final_score,
            moves = summary.moves_used,
            ?outcome,
            "session over"
        );
        self.summary = Some(summary);
    }

    /// Final score for this session. Returns `Some` exactly once, after the session has ended.
    pub fn take_summary(&mut self) -> Option<SessionSummary> {
        if self.summary_taken {
            return None;
        }
        let summary = self.summary?;
        self.summary_taken = true;
        Some(summary)
    }

    #[cfg(test)]
    pub fn with_grid(config: EngineConfig, grid: Grid) -> Self {
        let mut engine = Self::new(EngineConfig {
            grid_size: grid.size(),
            ..config
        });
        engine.grid = grid;
        engine
    }
}
