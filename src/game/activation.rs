//! Blast shapes for special tokens. Pure: computes positions, never mutates the board.

use super::grid::{Grid, Pos, Special};
use std::collections::BTreeSet;

/// Cells the special at `at` destroys when activated.
///
/// `target` only matters for colour bombs: the colour swapped into the bomb. Without it the bomb
/// clears its own carried colour. Normal tokens and empty cells blast nothing. A special caught in
/// the blast is listed but not detonated.
pub fn blast_radius(grid: &Grid, at: Pos, target: Option<u8>) -> BTreeSet<Pos> {
    let Some(token) = grid.get(at) else {
        return BTreeSet::new();
    };
    let size = grid.size();
    match token.special {
        Special::Normal => BTreeSet::new(),
        Special::StripedHorizontal => (0..size).map(|col| Pos::new(at.row, col)).collect(),
        Special::StripedVertical => (0..size).map(|row| Pos::new(row, at.col)).collect(),
        Special::Wrapped => {
            let mut cells = BTreeSet::new();
            for dr in -1..=1 {
                for dc in -1..=1 {
                    if let Some(pos) = at.offset(dr, dc, size) {
                        cells.insert(pos);
                    }
                }
            }
            cells
        }
        Special::ColorBomb => {
            let color = target.unwrap_or(token.color);
            grid.positions()
                .filter(|&pos| grid.get(pos).is_some_and(|t| t.color == color))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Grid {
        Grid::from_rows(&[
            &[0, 1, 2, 0, 1],
            &[2, 0, 1, 2, 0],
            &[1, 2, 0, 1, 2],
            &[0, 1, 2, 0, 1],
            &[2, 0, 1, 2, 0],
        ])
    }

    #[test]
    fn striped_clears_row_or_column() {
        let mut grid = board();
        grid.promote(Pos::new(2, 3), Special::StripedHorizontal);
        let row = blast_radius(&grid, Pos::new(2, 3), None);
        assert_eq!(row.len(), 5);
        assert!(row.iter().all(|p| p.row == 2));

        grid.promote(Pos::new(2, 3), Special::StripedVertical);
        let col = blast_radius(&grid, Pos::new(2, 3), None);
        assert_eq!(col.len(), 5);
        assert!(col.iter().all(|p| p.col == 3));
    }

    #[test]
    fn wrapped_is_clipped_at_edges() {
        let mut grid = board();
        grid.promote(Pos::new(2, 2), Special::Wrapped);
        assert_eq!(blast_radius(&grid, Pos::new(2, 2), None).len(), 9);

        grid.promote(Pos::new(0, 0), Special::Wrapped);
        let corner = blast_radius(&grid, Pos::new(0, 0), None);
        assert_eq!(corner.len(), 4);
        assert!(corner.contains(&Pos::new(1, 1)));

        grid.promote(Pos::new(0, 2), Special::Wrapped);
        assert_eq!(blast_radius(&grid, Pos::new(0, 2), None).len(), 6);
    }

    #[test]
    fn colour_bomb_removes_exactly_the_target_colour() {
        let mut grid = board();
        grid.promote(Pos::new(2, 2), Special::ColorBomb);
        let expected: BTreeSet<Pos> = grid
            .positions()
            .filter(|&p| grid.get(p).map(|t| t.color) == Some(1))
            .collect();
        let blast = blast_radius(&grid, Pos::new(2, 2), Some(1));
        assert_eq!(blast, expected);
        assert!(!blast.contains(&Pos::new(2, 2)));
    }

    #[test]
    fn colour_bomb_without_target_uses_own_colour() {
        let mut grid = board();
        grid.promote(Pos::new(2, 2), Special::ColorBomb);
        let blast = blast_radius(&grid, Pos::new(2, 2), None);
        // the bomb carries colour 0 and is counted with the other 0s
        assert!(blast.contains(&Pos::new(2, 2)));
        assert_eq!(blast.len(), 9);
    }

    #[test]
    fn normal_and_empty_cells_blast_nothing() {
        let mut grid = board();
        assert!(blast_radius(&grid, Pos::new(1, 1), None).is_empty());
        grid.set(Pos::new(1, 1), None);
        assert!(blast_radius(&grid, Pos::new(1, 1), None).is_empty());
    }
}
