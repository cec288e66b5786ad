//! Board state: token colours, special-token overlay, swap and adjacency helpers.

use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Cell reference, 0-indexed from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Edge-adjacent: one step along exactly one axis. Symmetric.
    pub fn is_adjacent(self, other: Self) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }

    /// Neighbour at (dr, dc) if it stays on a `size`×`size` board.
    pub fn offset(self, dr: isize, dc: isize, size: usize) -> Option<Self> {
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < size && col < size).then_some(Self { row, col })
    }
}

/// Effect carried by a token. Exactly one per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Special {
    #[default]
    Normal,
    /// Clears its whole row.
    StripedHorizontal,
    /// Clears its whole column.
    StripedVertical,
    /// Clears the 3×3 block around it.
    Wrapped,
    /// Clears every token of one colour; never matches by colour itself.
    ColorBomb,
}

impl Special {
    pub fn is_special(self) -> bool {
        self != Self::Normal
    }

    /// Promotion priority: wrapped > colour bomb > striped > normal.
    pub fn priority(self) -> u8 {
        match self {
            Self::Wrapped => 3,
            Self::ColorBomb => 2,
            Self::StripedHorizontal | Self::StripedVertical => 1,
            Self::Normal => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    /// Palette index; specials keep the base colour they were promoted from.
    pub color: u8,
    pub special: Special,
}

impl Token {
    pub const fn normal(color: u8) -> Self {
        Self {
            color,
            special: Special::Normal,
        }
    }

    /// Colour used for run detection. Colour bombs match nothing.
    pub fn match_color(self) -> Option<u8> {
        (self.special != Special::ColorBomb).then_some(self.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("cell ({}, {}) is outside the board", .0.row, .0.col)]
    OutOfBounds(Pos),
    #[error("cells ({}, {}) and ({}, {}) are not adjacent", .0.row, .0.col, .1.row, .1.col)]
    NotAdjacent(Pos, Pos),
    #[error("a swap or cascade is already in flight")]
    Busy,
    #[error("the session has ended")]
    SessionOver,
    #[error("no moves left")]
    NoMovesLeft,
}

/// Square board. `None` marks a cell emptied mid-resolution; never observed at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Token>>,
}

impl Grid {
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Random board with no pre-existing run of three. Fails open: if the retry budget runs out
    /// the best-effort board is returned.
    pub fn generate<R: Rng + ?Sized>(size: usize, colors: u8, retry_budget: u32, rng: &mut R) -> Self {
        let mut grid = Self::empty(size);
        for cell in &mut grid.cells {
            *cell = Some(Token::normal(rng.random_range(0..colors)));
        }
        for _ in 0..retry_budget {
            if grid.fixup_pass(colors, rng) == 0 {
                return grid;
            }
        }
        let leftover = grid.count_matched_cells();
        if leftover > 0 {
            warn!(leftover, retry_budget, "board generation kept a run after exhausting retries");
        }
        grid
    }

    /// One row-major sweep rewriting every cell that sits in a run of three. Replacement colours
    /// never complete a new run through the rewritten cell when such a colour exists, so the
    /// matched-cell count never grows. Returns the number of rewritten cells.
    pub fn fixup_pass<R: Rng + ?Sized>(&mut self, colors: u8, rng: &mut R) -> usize {
        let mut rewritten = 0;
        for row in 0..self.size {
            for col in 0..self.size {
                let pos = Pos::new(row, col);
                let Some(color) = self.get(pos).and_then(Token::match_color) else {
                    continue;
                };
                if !self.completes_run(pos, color) {
                    continue;
                }
                let fresh = self.safe_color(pos, color, colors, rng);
                self.set(pos, Some(Token::normal(fresh)));
                rewritten += 1;
            }
        }
        rewritten
    }

    fn safe_color<R: Rng + ?Sized>(&self, pos: Pos, current: u8, colors: u8, rng: &mut R) -> u8 {
        let mut choices: Vec<u8> = (0..colors)
            .filter(|&c| c != current && !self.completes_run(pos, c))
            .collect();
        if choices.is_empty() {
            choices = (0..colors).filter(|&c| c != current).collect();
        }
        if choices.is_empty() {
            return current;
        }
        choices[rng.random_range(0..choices.len())]
    }

    /// True if `color` at `pos` would sit in a horizontal or vertical run of three or more.
    fn completes_run(&self, pos: Pos, color: u8) -> bool {
        let horizontal = self.stretch(pos, 0, -1, color) + self.stretch(pos, 0, 1, color) + 1;
        let vertical = self.stretch(pos, -1, 0, color) + self.stretch(pos, 1, 0, color) + 1;
        horizontal >= 3 || vertical >= 3
    }

    /// Same-coloured cells walking away from `pos` (exclusive) in one direction.
    fn stretch(&self, pos: Pos, dr: isize, dc: isize, color: u8) -> usize {
        let mut n = 0;
        let mut cur = pos;
        while let Some(next) = cur.offset(dr, dc, self.size) {
            if self.match_color(next) != Some(color) {
                break;
            }
            n += 1;
            cur = next;
        }
        n
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    #[inline]
    fn index(&self, pos: Pos) -> usize {
        pos.row * self.size + pos.col
    }

    #[inline]
    pub fn get(&self, pos: Pos) -> Option<Token> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells[self.index(pos)]
    }

    #[inline]
    pub fn set(&mut self, pos: Pos, token: Option<Token>) {
        if self.in_bounds(pos) {
            let i = self.index(pos);
            self.cells[i] = token;
        }
    }

    /// Run-detection colour at `pos`; `None` for empty cells and colour bombs.
    #[inline]
    pub fn match_color(&self, pos: Pos) -> Option<u8> {
        self.get(pos).and_then(Token::match_color)
    }

    /// Keep the colour at `pos` and tag it with `special`.
    pub fn promote(&mut self, pos: Pos, special: Special) {
        if let Some(token) = self.get(pos) {
            self.set(pos, Some(Token { special, ..token }));
        }
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + use<> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Pos::new(row, col)))
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    pub fn is_full(&self) -> bool {
        self.empty_count() == 0
    }

    /// Cells currently inside a run of three or more.
    pub fn count_matched_cells(&self) -> usize {
        super::matcher::find_matches(self).matched.len()
    }

    /// New board with the tokens at `a` and `b` exchanged. Rejects out-of-bounds or non-adjacent
    /// cells; `self` is never touched.
    pub fn swapped(&self, a: Pos, b: Pos) -> Result<Self, SwapError> {
        for p in [a, b] {
            if !self.in_bounds(p) {
                return Err(SwapError::OutOfBounds(p));
            }
        }
        if !a.is_adjacent(b) {
            return Err(SwapError::NotAdjacent(a, b));
        }
        let mut next = self.clone();
        let (ia, ib) = (self.index(a), self.index(b));
        next.cells.swap(ia, ib);
        Ok(next)
    }

    /// Board from colour rows, all tokens normal. Rows must form a square.
    #[cfg(test)]
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        let size = rows.len();
        let mut grid = Self::empty(size);
        for (row, line) in rows.iter().enumerate() {
            assert_eq!(line.len(), size, "row {row} is not {size} wide");
            for (col, &color) in line.iter().enumerate() {
                grid.set(Pos::new(row, col), Some(Token::normal(color)));
            }
        }
        grid
    }
}
