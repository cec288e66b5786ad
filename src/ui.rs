//! Layout and drawing: board, sidebar, pause and game-over overlays, clear fade.

use crate::app::{GameOverReason, Screen};
use crate::game::{Engine, Outcome, Phase, Pos, Special, Token};
use crate::report::Submission;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each token is drawn as " ● ": three columns by one row.
const CELL_WIDTH: u16 = 3;
const CELL_HEIGHT: u16 = 1;
const SIDEBAR_WIDTH: u16 = 26;
/// Fade of cleared cells; shorter than the default clear delay so it finishes on screen.
const CLEAR_FADE_MS: u32 = 250;

/// Everything the renderer reads for one frame.
pub struct View<'a> {
    pub engine: &'a Engine,
    pub theme: &'a Theme,
    pub screen: Screen,
    pub paused: bool,
    pub cursor: Pos,
    pub selected: Option<Pos>,
    /// Time left on the session clock; `None` when untimed.
    pub remaining: Option<Duration>,
    pub time_limit: Option<Duration>,
    pub best: u64,
    pub new_best: bool,
    /// Scores of finished games this run, newest first.
    pub history: &'a [u64],
    pub longest_chain: u32,
    pub player: &'a str,
    pub status: Option<&'a str>,
    pub game_over_reason: Option<GameOverReason>,
    pub outcome: Option<Outcome>,
    pub submission: Option<Submission>,
    pub animate: bool,
}

/// Fade effect over the cells the engine just cleared. Rebuilt whenever the cleared set changes.
#[derive(Default)]
pub struct ClearFade {
    cells: BTreeSet<Pos>,
    effect: Option<Effect>,
    processed: Option<Instant>,
}

impl ClearFade {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Board size in terminal cells including the border.
fn board_outer_size(grid_size: usize) -> (u16, u16) {
    let n = grid_size as u16;
    (n * CELL_WIDTH + 2, n * CELL_HEIGHT + 2)
}

/// Board and sidebar rects, centred in `area`.
fn layout(area: Rect, grid_size: usize) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size(grid_size);
    let total_w = bw + SIDEBAR_WIDTH;
    let total_h = bh.max(sidebar_height());

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let board = Rect {
        height: bh.min(inner[0].height),
        ..inner[0]
    };
    (board, inner[1])
}

fn sidebar_height() -> u16 {
    7 + 1 + 6 + 1 + 3 + 1 + 4
}

/// Inner board rect (no border).
fn board_inner(board: Rect, grid_size: usize) -> Rect {
    let n = grid_size as u16;
    Rect {
        x: board.x + 1,
        y: board.y + 1,
        width: (n * CELL_WIDTH).min(board.width.saturating_sub(2)),
        height: (n * CELL_HEIGHT).min(board.height.saturating_sub(2)),
    }
}

fn cell_rect(inner: Rect, pos: Pos) -> Rect {
    Rect {
        x: inner.x + pos.col as u16 * CELL_WIDTH,
        y: inner.y + pos.row as u16 * CELL_HEIGHT,
        width: CELL_WIDTH,
        height: CELL_HEIGHT,
    }
}

fn glyph(special: Special) -> &'static str {
    match special {
        Special::Normal => "●",
        Special::StripedHorizontal => "═",
        Special::StripedVertical => "║",
        Special::Wrapped => "▣",
        Special::ColorBomb => "✱",
    }
}

/// Draw the current screen. The clear fade runs while the engine holds a removal set.
pub fn draw(frame: &mut Frame, view: &View, fade: &mut ClearFade, now: Instant) {
    let area = frame.area();
    let grid_size = view.engine.grid().size();
    let (bw, bh) = board_outer_size(grid_size);
    if area.width < bw + SIDEBAR_WIDTH || area.height < bh {
        draw_too_small(frame, view.theme, area);
        return;
    }
    let (board, sidebar) = layout(area, grid_size);
    draw_board(frame, view, board);
    draw_sidebar(frame, view, sidebar);

    match view.screen {
        Screen::Playing => {
            if view.paused {
                draw_pause_overlay(frame, view.theme, area);
            } else if view.animate {
                apply_clear_effect(frame, view, board_inner(board, grid_size), fade, now);
            }
        }
        Screen::GameOver => draw_game_over(frame, view, area),
    }
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect) {
    let p = Paragraph::new(Line::from(Span::styled(
        "Terminal too small",
        Style::default().fg(theme.main_fg),
    )))
    .alignment(Alignment::Center);
    p.render(area, frame.buffer_mut());
}

fn draw_board(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let engine = view.engine;
    let title = format!(" Gemtui  | Moves: {} ", engine.moves_left());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let grid_size = engine.grid().size();
    let inner = board_inner(area, grid_size);
    block.render(area, frame.buffer_mut());

    let removed = engine.pending_removal();
    let show_cursor = view.screen == Screen::Playing && !view.paused;
    let buf = frame.buffer_mut();
    for pos in engine.grid().positions() {
        let rect = cell_rect(inner, pos);
        if rect.right() > inner.right() || rect.bottom() > inner.bottom() {
            continue;
        }
        let mut bg = theme.bg;
        if show_cursor && view.selected == Some(pos) {
            bg = theme.selected_bg;
        } else if show_cursor && view.cursor == pos {
            bg = theme.inactive_fg;
        }
        let (symbol, fg) = match engine.grid().get(pos) {
            Some(Token {
                special: Special::ColorBomb,
                ..
            }) => (glyph(Special::ColorBomb), theme.main_fg),
            Some(token) => (glyph(token.special), theme.token_color(token.color)),
            None if removed.contains(&pos) => ("✦", Color::White),
            None => (" ", theme.bg),
        };
        let mut style = Style::default().fg(fg).bg(bg);
        if view.selected == Some(pos) {
            style = style.bold();
        }
        buf.set_string(rect.x, rect.y, format!(" {symbol} "), style);
    }
}

/// Create or update the clear fade and process it (TachyonFX: fade cleared cells to bg).
fn apply_clear_effect(
    frame: &mut Frame,
    view: &View,
    board_rect: Rect,
    fade: &mut ClearFade,
    now: Instant,
) {
    let removed = view.engine.pending_removal();
    if removed.is_empty() {
        fade.reset();
        return;
    }
    if fade.effect.is_none() || fade.cells != *removed {
        let positions: HashSet<(u16, u16)> = removed
            .iter()
            .flat_map(|&pos| {
                let r = cell_rect(board_rect, pos);
                (r.x..r.right()).flat_map(move |x| (r.y..r.bottom()).map(move |y| (x, y)))
            })
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board_rect);
        fade.cells = removed.clone();
        fade.effect = Some(effect);
        fade.processed = None;
    }

    let delta = fade
        .processed
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    fade.processed = Some(now);
    if let Some(effect) = fade.effect.as_mut().filter(|e| !e.done()) {
        frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
    }
}

fn sidebar_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
}

fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "your move",
        Phase::Swapping => "swapping",
        Phase::Resolving => "clearing",
        Phase::Settling => "falling",
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let engine = view.engine;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats
            Constraint::Length(1),
            Constraint::Length(6), // Session
            Constraint::Length(1),
            Constraint::Length(3), // Colours
            Constraint::Length(1),
            Constraint::Length(4), // Clock
        ])
        .split(area);

    let stats_block = sidebar_block(theme);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        stat("Score: ", engine.score().to_string()),
        stat("Best: ", view.best.max(engine.score()).to_string()),
        stat("Moves: ", format!("{} / {}", engine.moves_left(), engine.config().max_moves)),
        stat("Chain: ", view.longest_chain.to_string()),
        stat("Target: ", engine.config().win_threshold.to_string()),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    let session_block = sidebar_block(theme);
    let session_inner = session_block.inner(chunks[2]);
    session_block.render(chunks[2], frame.buffer_mut());
    let mut session_lines = vec![
        stat("Player: ", view.player.to_string()),
        stat("State: ", phase_label(engine.phase()).to_string()),
    ];
    if let Some(status) = view.status {
        session_lines.push(Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(theme.inactive_fg),
        )));
    }
    Paragraph::new(Text::from(session_lines)).render(session_inner, frame.buffer_mut());

    let colours_block = sidebar_block(theme);
    let colours_inner = colours_block.inner(chunks[4]);
    colours_block.render(chunks[4], frame.buffer_mut());
    draw_colour_strip(frame, theme, engine.config().color_count, colours_inner);

    let clock_block = sidebar_block(theme);
    let clock_inner = clock_block.inner(chunks[6]);
    clock_block.render(chunks[6], frame.buffer_mut());
    let clock_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(clock_inner);
    let (label, ratio) = match (view.remaining, view.time_limit) {
        (Some(left), Some(limit)) if !limit.is_zero() => (
            format!("Time: {}", format_clock(left)),
            (left.as_secs_f64() / limit.as_secs_f64()).clamp(0.0, 1.0),
        ),
        _ => {
            let max = engine.config().max_moves.max(1);
            (
                "Moves left".to_string(),
                f64::from(engine.moves_left()) / f64::from(max),
            )
        }
    };
    Paragraph::new(Line::from(Span::styled(label, title_style)))
        .render(clock_layout[0], frame.buffer_mut());
    let bar_color = if ratio > 0.5 {
        Color::Green
    } else if ratio > 0.2 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio)
        .gauge_style(Style::default().fg(bar_color))
        .render(clock_layout[1], frame.buffer_mut());
}

/// Draw a row of coloured blocks, one per colour in play.
fn draw_colour_strip(frame: &mut Frame, theme: &Theme, colors: u8, area: Rect) {
    let block_w = (area.width / u16::from(colors.max(1))).max(1);
    for i in 0..colors {
        let r = Rect {
            x: area.x + u16::from(i) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        };
        if r.right() > area.right() {
            break;
        }
        let c = theme.token_color(i);
        Paragraph::new("█".repeat(block_w as usize))
            .style(Style::default().fg(c).bg(c))
            .render(r, frame.buffer_mut());
    }
}

fn popup_rect(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = popup_rect(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P Resume    Q Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// " Recent: 120  80  40 ", or nothing before the first finished game.
fn recent_scores(history: &[u64]) -> Option<String> {
    if history.is_empty() {
        return None;
    }
    let scores: Vec<String> = history.iter().map(u64::to_string).collect();
    Some(format!(" Recent: {} ", scores.join("  ")))
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let engine = view.engine;
    let fg = Style::default().fg(theme.main_fg);
    let title = match view.game_over_reason {
        Some(GameOverReason::TimeUp) => " Time's up! ",
        Some(GameOverReason::OutOfMoves) => " Out of moves ",
        None => " Game Over ",
    };
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", engine.score()), fg)),
        Line::from(Span::styled(format!(" Best: {} ", view.best), fg)),
        Line::from(Span::styled(
            format!(
                " Moves used: {} ",
                engine.config().max_moves - engine.moves_left()
            ),
            fg,
        )),
    ];
    match view.outcome {
        Some(Outcome::Win) => lines.push(Line::from(Span::styled(
            " You win! ",
            Style::default().fg(Color::Green).bold(),
        ))),
        Some(Outcome::Lose) => lines.push(Line::from(Span::styled(
            format!(" Needed {} to win ", engine.config().win_threshold),
            fg,
        ))),
        None => {}
    }
    if view.new_best {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    if let Some(text) = recent_scores(view.history) {
        lines.push(Line::from(Span::styled(text, fg)));
    }
    let report_line = match view.submission {
        Some(Submission::Sent) => Some(" Score submitted "),
        Some(Submission::SkippedGuest) => Some(" Guest play: score not submitted "),
        Some(Submission::Failed) => Some(" Score submission failed "),
        Some(Submission::NoSink) | None => None,
    };
    if let Some(text) = report_line {
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(theme.inactive_fg),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R Restart    Q Quit ", fg)));
    lines.push(Line::from(""));

    let popup = popup_rect(area, 38, lines.len() as u16 + 2);
    for y in popup.y..popup.bottom() {
        for x in popup.x..popup.right() {
            frame.buffer_mut()[(x, y)].reset();
        }
    }
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Gemtui ", theme.title)),
    );
    p.render(popup, frame.buffer_mut());
}
