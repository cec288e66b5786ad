//! App: terminal init, main loop, session clock and key handling.

use crate::game::{Engine, EngineConfig, Outcome, Phase, Pos, SessionSummary, SwapOutcome};
use crate::highscores;
use crate::input::{Action, key_to_action};
use crate::report::{Reporter, Submission};
use crate::theme::Theme;
use crate::ui::{self, ClearFade, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Target frame time (~60 FPS).
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    TimeUp,
    OutOfMoves,
}

/// Wall-clock session timer that stops while the game is paused.
#[derive(Debug, Clone, Copy)]
struct PlayClock {
    started: Instant,
    paused_at: Option<Instant>,
    paused_for: Duration,
}

impl PlayClock {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            paused_at: None,
            paused_for: Duration::ZERO,
        }
    }

    fn pause(&mut self, now: Instant) {
        self.paused_at.get_or_insert(now);
    }

    fn resume(&mut self, now: Instant) {
        if let Some(at) = self.paused_at.take() {
            self.paused_for += now.saturating_duration_since(at);
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        let until = self.paused_at.unwrap_or(now);
        until
            .saturating_duration_since(self.started)
            .saturating_sub(self.paused_for)
    }
}

/// Finished scores kept for the game-over screen.
const HISTORY_LEN: usize = 5;

/// Scores of the games finished since launch, newest first.
#[derive(Debug, Clone, Default)]
struct ScoreHistory(Vec<u64>);

impl ScoreHistory {
    fn record(&mut self, score: u64) {
        self.0.insert(0, score);
        self.0.truncate(HISTORY_LEN);
    }

    fn recent(&self) -> &[u64] {
        &self.0
    }
}

/// Cascade depth as seen through the engine's transition callback.
#[derive(Debug, Clone, Copy, Default)]
struct ChainStats {
    last: Phase,
    depth: u32,
    longest: u32,
}

impl ChainStats {
    fn observe(&mut self, phase: Phase) {
        match phase {
            Phase::Resolving if self.last != Phase::Resolving => {
                self.depth += 1;
                self.longest = self.longest.max(self.depth);
            }
            Phase::Idle => self.depth = 0,
            _ => {}
        }
        self.last = phase;
    }
}

pub struct App {
    theme: Theme,
    engine: Engine,
    reporter: Reporter,
    screen: Screen,
    paused: bool,
    cursor: Pos,
    selected: Option<Pos>,
    clock: PlayClock,
    time_limit: Option<Duration>,
    game_over_reason: Option<GameOverReason>,
    outcome: Option<Outcome>,
    submission: Option<Submission>,
    best: u64,
    new_best: bool,
    history: ScoreHistory,
    chain: Rc<Cell<ChainStats>>,
    status: Option<String>,
    fade: ClearFade,
}

impl App {
    pub fn new(config: EngineConfig, theme: Theme, reporter: Reporter, time_limit: Option<Duration>) -> Self {
        let mut engine = Engine::new(config);
        let chain = Rc::new(Cell::new(ChainStats::default()));
        let observed = Rc::clone(&chain);
        engine.on_state_change(move |phase, _, _| {
            let mut stats = observed.get();
            stats.observe(phase);
            observed.set(stats);
        });
        let size = engine.grid().size();
        Self {
            theme,
            engine,
            reporter,
            screen: Screen::Playing,
            paused: false,
            cursor: Pos::new(size / 2, size / 2),
            selected: None,
            clock: PlayClock::new(Instant::now()),
            time_limit,
            game_over_reason: None,
            outcome: None,
            submission: None,
            best: highscores::load_best(),
            new_best: false,
            history: ScoreHistory::default(),
            chain,
            status: None,
            fade: ClearFade::default(),
        }
    }

    fn reset_game(&mut self) {
        self.engine.restart();
        let size = self.engine.grid().size();
        self.screen = Screen::Playing;
        self.paused = false;
        self.cursor = Pos::new(size / 2, size / 2);
        self.selected = None;
        self.clock = PlayClock::new(Instant::now());
        self.game_over_reason = None;
        self.outcome = None;
        self.submission = None;
        self.new_best = false;
        self.chain.set(ChainStats::default());
        self.status = None;
        self.fade.reset();
    }

    fn toggle_pause(&mut self, now: Instant) {
        self.paused = !self.paused;
        if self.paused {
            self.clock.pause(now);
        } else {
            self.clock.resume(now);
        }
        debug!(paused = self.paused, "pause toggled");
    }

    fn move_cursor(&mut self, (dr, dc): (isize, isize)) {
        let size = self.engine.grid().size();
        if let Some(next) = self.cursor.offset(dr, dc, size) {
            self.cursor = next;
        }
    }

    fn try_swap(&mut self, a: Pos, b: Pos, now: Instant) {
        self.selected = None;
        match self.engine.request_swap(a, b, now) {
            Ok(SwapOutcome::Committed | SwapOutcome::Detonated) => {
                self.cursor = b;
                self.status = None;
                if self.engine.config().clear_delay.is_zero() {
                    self.engine.run_until_idle();
                }
            }
            Ok(SwapOutcome::Reverted) => self.status = Some("No match".to_string()),
            Err(e) => {
                debug!(error = %e, "swap refused");
                self.status = Some(e.to_string());
            }
        }
    }

    fn apply_action(&mut self, action: Action, now: Instant) {
        let idle = self.engine.is_idle();
        match action {
            Action::Move(dir) => match self.selected {
                Some(from) if idle => {
                    let size = self.engine.grid().size();
                    let (dr, dc) = dir.delta();
                    match from.offset(dr, dc, size) {
                        Some(to) => self.try_swap(from, to, now),
                        None => self.selected = None,
                    }
                }
                _ => self.move_cursor(dir.delta()),
            },
            Action::Select if idle => match self.selected {
                None => self.selected = Some(self.cursor),
                Some(sel) if sel == self.cursor => self.selected = None,
                Some(sel) if sel.is_adjacent(self.cursor) => self.try_swap(sel, self.cursor, now),
                Some(_) => self.selected = Some(self.cursor),
            },
            Action::Cancel => self.selected = None,
            Action::Restart => self.reset_game(),
            Action::Select | Action::Pause | Action::Quit | Action::None => {}
        }
    }

    /// Ask the engine to wrap up once time or moves run out.
    fn check_session_end(&mut self, now: Instant) {
        if self.engine.end_requested() {
            return;
        }
        let time_up = self
            .time_limit
            .is_some_and(|limit| self.clock.elapsed(now) >= limit);
        let reason = if time_up {
            GameOverReason::TimeUp
        } else if self.engine.moves_left() == 0 {
            GameOverReason::OutOfMoves
        } else {
            return;
        };
        self.game_over_reason = Some(reason);
        self.selected = None;
        self.engine.end_session();
    }

    fn finish_session(&mut self, summary: SessionSummary) {
        self.outcome = Some(summary.outcome);
        self.history.record(summary.final_score);
        if summary.final_score > self.best {
            self.best = summary.final_score;
            self.new_best = true;
            if let Err(e) = highscores::save_best(self.best) {
                warn!(error = %e, "could not save best score");
            }
        }
        self.submission = Some(self.reporter.submit(&summary));
        info!(
            score = summary.final_score,
            longest_chain = self.chain.get().longest,
            reason = ?self.game_over_reason,
            "game over"
        );
        self.screen = Screen::GameOver;
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            if self.screen == Screen::Playing && !self.paused {
                self.engine.tick(now);
                self.check_session_end(now);
                if let Some(summary) = self.engine.take_summary() {
                    self.finish_session(summary);
                }
            }

            let remaining = self
                .time_limit
                .map(|limit| limit.saturating_sub(self.clock.elapsed(now)));
            let view = View {
                engine: &self.engine,
                theme: &self.theme,
                screen: self.screen,
                paused: self.paused,
                cursor: self.cursor,
                selected: self.selected,
                remaining,
                time_limit: self.time_limit,
                best: self.best,
                new_best: self.new_best,
                history: self.history.recent(),
                longest_chain: self.chain.get().longest,
                player: self.reporter.identity().label(),
                status: self.status.as_deref(),
                game_over_reason: self.game_over_reason,
                outcome: self.outcome,
                submission: self.submission,
                animate: !self.engine.config().clear_delay.is_zero(),
            };
            let fade = &mut self.fade;
            terminal.draw(|f| ui::draw(f, &view, fade, now))?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let action = key_to_action(key);
                let now = Instant::now();
                match self.screen {
                    Screen::Playing => match action {
                        Action::Quit => return Ok(()),
                        Action::Pause => self.toggle_pause(now),
                        _ if self.paused => {}
                        _ => self.apply_action(action, now),
                    },
                    Screen::GameOver => match action {
                        Action::Quit => return Ok(()),
                        Action::Restart => self.reset_game(),
                        _ => {}
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_stops_while_paused() {
        let start = Instant::now();
        let mut clock = PlayClock::new(start);
        clock.pause(start + Duration::from_secs(10));
        assert_eq!(clock.elapsed(start + Duration::from_secs(40)), Duration::from_secs(10));
        clock.resume(start + Duration::from_secs(40));
        assert_eq!(clock.elapsed(start + Duration::from_secs(45)), Duration::from_secs(15));
    }

    #[test]
    fn double_pause_keeps_first_instant() {
        let start = Instant::now();
        let mut clock = PlayClock::new(start);
        clock.pause(start + Duration::from_secs(5));
        clock.pause(start + Duration::from_secs(8));
        clock.resume(start + Duration::from_secs(9));
        assert_eq!(clock.elapsed(start + Duration::from_secs(9)), Duration::from_secs(5));
    }

    #[test]
    fn history_keeps_newest_scores_first() {
        let mut history = ScoreHistory::default();
        for score in [10, 20, 30, 40, 50, 60] {
            history.record(score);
        }
        assert_eq!(history.recent(), &[60, 50, 40, 30, 20]);
    }

    #[test]
    fn chain_counts_resolving_passes_per_cascade() {
        let mut stats = ChainStats::default();
        for phase in [
            Phase::Swapping,
            Phase::Resolving,
            Phase::Settling,
            Phase::Resolving,
            Phase::Settling,
            Phase::Idle,
            Phase::Swapping,
            Phase::Resolving,
            Phase::Settling,
            Phase::Idle,
        ] {
            stats.observe(phase);
        }
        assert_eq!(stats.longest, 2);
        assert_eq!(stats.depth, 0);
    }
}
