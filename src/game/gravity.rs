//! Gravity and refill.

use super::grid::{Grid, Pos, Token};
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub grid: Grid,
    /// Cells filled with fresh tokens from the top of each column.
    pub refilled: usize,
    /// Cells the final fix-up sweep had to fill. Always 0 unless the column pass is broken.
    pub repaired: usize,
}

/// Compact every column downward, keeping relative order and special tags, then fill the
/// vacated top cells with fresh normal tokens.
pub fn settle<R: Rng + ?Sized>(mut grid: Grid, colors: u8, rng: &mut R) -> Settled {
    let size = grid.size();
    let mut refilled = 0;
    for col in 0..size {
        let survivors: Vec<Token> = (0..size)
            .rev()
            .filter_map(|row| grid.get(Pos::new(row, col)))
            .collect();
        for (i, row) in (0..size).rev().enumerate() {
            grid.set(Pos::new(row, col), survivors.get(i).copied());
        }
        for row in 0..size - survivors.len() {
            grid.set(Pos::new(row, col), Some(Token::normal(rng.random_range(0..colors))));
            refilled += 1;
        }
    }

    let mut repaired = 0;
    for pos in grid.positions() {
        if grid.get(pos).is_none() {
            grid.set(pos, Some(Token::normal(rng.random_range(0..colors))));
            repaired += 1;
        }
    }
    if repaired > 0 {
        warn!(repaired, "gravity fix-up filled residual empty cells");
    }

    Settled {
        grid,
        refilled,
        repaired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Special;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn tokens_fall_in_order_with_specials() {
        let mut grid = Grid::from_rows(&[&[0, 1, 2], &[3, 4, 5], &[1, 2, 3]]);
        grid.promote(Pos::new(0, 0), Special::Wrapped);
        grid.set(Pos::new(1, 0), None);
        grid.set(Pos::new(2, 0), None);
        grid.set(Pos::new(2, 1), None);

        let mut rng = StdRng::seed_from_u64(1);
        let settled = settle(grid, 6, &mut rng);
        assert_eq!(settled.refilled, 3);
        assert_eq!(settled.repaired, 0);
        assert!(settled.grid.is_full());

        let g = &settled.grid;
        assert_eq!(g.get(Pos::new(2, 0)), Some(Token { color: 0, special: Special::Wrapped }));
        assert_eq!(g.get(Pos::new(2, 1)), Some(Token::normal(4)));
        assert_eq!(g.get(Pos::new(1, 1)), Some(Token::normal(1)));
        // untouched column
        assert_eq!(g.get(Pos::new(0, 2)), Some(Token::normal(2)));
        assert_eq!(g.get(Pos::new(2, 2)), Some(Token::normal(3)));
        // refilled cells are plain
        assert_eq!(g.get(Pos::new(0, 0)).map(|t| t.special), Some(Special::Normal));
    }

    #[test]
    fn non_empty_plus_refilled_is_whole_board() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let mut grid = Grid::generate(8, 6, 50, &mut rng);
            for pos in grid.positions() {
                if rng.random_bool(0.3) {
                    grid.set(pos, None);
                }
            }
            let survivors = 64 - grid.empty_count();
            let settled = settle(grid, 6, &mut rng);
            assert_eq!(survivors + settled.refilled, 64);
            assert!(settled.grid.is_full());
        }
    }

    #[test]
    fn full_board_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(5);
        let grid = Grid::generate(6, 6, 50, &mut rng);
        let settled = settle(grid.clone(), 6, &mut rng);
        assert_eq!(settled.grid, grid);
        assert_eq!(settled.refilled, 0);
    }
}
