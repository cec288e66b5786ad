//! Run detection: horizontal/vertical runs of three or more, T/L intersections, and the
//! special-token candidates each shape produces.

use super::grid::{Grid, Pos, Special};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Maximal run of three or more same-coloured cells along one row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub axis: Axis,
    /// Row index for horizontal runs, column index for vertical ones.
    pub line: usize,
    pub start: usize,
    pub len: usize,
    pub color: u8,
}

impl Run {
    fn at(&self, offset: usize) -> Pos {
        match self.axis {
            Axis::Horizontal => Pos::new(self.line, self.start + offset),
            Axis::Vertical => Pos::new(self.start + offset, self.line),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.len).map(|i| self.at(i))
    }

    /// Placement cell for a special token. Even lengths take the lower (floor) middle index, so
    /// a four-run spanning 0..=3 promotes at offset 1.
    pub fn midpoint(&self) -> Pos {
        self.at((self.len - 1) / 2)
    }
}

/// A proposed promotion. `runs` indexes into [`MatchReport::runs`]: the source run, then the
/// run crossing the same cell if there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub pos: Pos,
    pub kind: Special,
    pub runs: [Option<usize>; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub runs: Vec<Run>,
    pub matched: BTreeSet<Pos>,
    pub candidates: Vec<Candidate>,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Scan a board snapshot. Empty cells and colour bombs break runs.
pub fn find_matches(grid: &Grid) -> MatchReport {
    let size = grid.size();
    let mut runs = Vec::new();
    scan_lines(grid, Axis::Horizontal, &mut runs);
    scan_lines(grid, Axis::Vertical, &mut runs);

    // Per-cell run membership, one slot per axis.
    let mut h_run = vec![None; size * size];
    let mut v_run = vec![None; size * size];
    let mut matched = BTreeSet::new();
    for (id, run) in runs.iter().enumerate() {
        let slots = match run.axis {
            Axis::Horizontal => &mut h_run,
            Axis::Vertical => &mut v_run,
        };
        for pos in run.cells() {
            slots[pos.row * size + pos.col] = Some(id);
            matched.insert(pos);
        }
    }

    let mut candidates = Vec::new();
    let mut crossed = vec![false; runs.len()];
    for pos in &matched {
        let i = pos.row * size + pos.col;
        if let (Some(h), Some(v)) = (h_run[i], v_run[i]) {
            crossed[h] = true;
            crossed[v] = true;
            candidates.push(Candidate {
                pos: *pos,
                kind: Special::Wrapped,
                runs: [Some(h), Some(v)],
            });
        }
    }

    // A crossed four-run is already covered by its wrapped cell; five or more always earn a bomb.
    for (id, run) in runs.iter().enumerate() {
        let kind = match (run.len, run.axis) {
            (5.., _) => Special::ColorBomb,
            (4, _) if crossed[id] => continue,
            (4, Axis::Horizontal) => Special::StripedVertical,
            (4, Axis::Vertical) => Special::StripedHorizontal,
            _ => continue,
        };
        let pos = run.midpoint();
        let i = pos.row * size + pos.col;
        let across = match run.axis {
            Axis::Horizontal => v_run[i],
            Axis::Vertical => h_run[i],
        };
        candidates.push(Candidate {
            pos,
            kind,
            runs: [Some(id), across],
        });
    }

    MatchReport {
        runs,
        matched,
        candidates,
    }
}

fn scan_lines(grid: &Grid, axis: Axis, runs: &mut Vec<Run>) {
    let size = grid.size();
    let cell = |line: usize, i: usize| match axis {
        Axis::Horizontal => Pos::new(line, i),
        Axis::Vertical => Pos::new(i, line),
    };
    for line in 0..size {
        let mut start = 0;
        while start < size {
            let Some(color) = grid.match_color(cell(line, start)) else {
                start += 1;
                continue;
            };
            let mut end = start + 1;
            while end < size && grid.match_color(cell(line, end)) == Some(color) {
                end += 1;
            }
            let len = end - start;
            if len >= 3 {
                runs.push(Run {
                    axis,
                    line,
                    start,
                    len,
                    color,
                });
            }
            start = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Token;
    use std::collections::HashSet;

    fn positions(list: &[(usize, usize)]) -> BTreeSet<Pos> {
        list.iter().map(|&(r, c)| Pos::new(r, c)).collect()
    }

    #[test]
    fn plain_three_run_has_no_candidates() {
        let grid = Grid::from_rows(&[&[0, 0, 0], &[1, 2, 1], &[2, 1, 2]]);
        let report = find_matches(&grid);
        assert_eq!(report.matched, positions(&[(0, 0), (0, 1), (0, 2)]));
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn vertical_four_run_yields_striped_horizontal() {
        let grid = Grid::from_rows(&[
            &[0, 1, 2, 3, 4],
            &[0, 2, 3, 4, 1],
            &[0, 3, 4, 1, 2],
            &[0, 4, 1, 2, 3],
            &[1, 0, 2, 3, 4],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.matched, positions(&[(0, 0), (1, 0), (2, 0), (3, 0)]));
        assert_eq!(report.candidates.len(), 1);
        let candidate = report.candidates[0];
        assert_eq!(candidate.kind, Special::StripedHorizontal);
        assert_eq!(candidate.pos, Pos::new(1, 0));
        assert!(report.candidates.iter().all(|c| c.kind != Special::ColorBomb));
    }

    #[test]
    fn horizontal_four_run_yields_striped_vertical_at_floor_midpoint() {
        let grid = Grid::from_rows(&[
            &[1, 2, 1, 2, 1],
            &[3, 3, 3, 3, 4],
            &[1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2],
            &[4, 0, 4, 0, 4],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].kind, Special::StripedVertical);
        assert_eq!(report.candidates[0].pos, Pos::new(1, 1));
    }

    #[test]
    fn five_run_yields_colour_bomb_at_centre() {
        let grid = Grid::from_rows(&[
            &[1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2],
            &[3, 3, 3, 3, 3],
            &[1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.matched.len(), 5);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].kind, Special::ColorBomb);
        assert_eq!(report.candidates[0].pos, Pos::new(2, 2));
    }

    #[test]
    fn l_shape_yields_wrapped_at_corner_only() {
        let grid = Grid::from_rows(&[
            &[5, 5, 5, 1, 2],
            &[5, 1, 2, 3, 4],
            &[5, 2, 3, 4, 1],
            &[5, 3, 4, 1, 2],
            &[1, 4, 1, 2, 3],
        ]);
        let report = find_matches(&grid);
        // a 4-run down column 0 crossing a 3-run along row 0
        assert_eq!(report.matched.len(), 6);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].kind, Special::Wrapped);
        assert_eq!(report.candidates[0].pos, Pos::new(0, 0));
    }

    #[test]
    fn five_run_crossed_by_three_keeps_its_bomb() {
        let grid = Grid::from_rows(&[
            &[5, 5, 5, 5, 5],
            &[1, 2, 1, 2, 5],
            &[2, 1, 2, 1, 5],
            &[1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.matched.len(), 7);
        let kinds: HashSet<(Pos, Special)> =
            report.candidates.iter().map(|c| (c.pos, c.kind)).collect();
        assert_eq!(
            kinds,
            HashSet::from([
                (Pos::new(0, 4), Special::Wrapped),
                (Pos::new(0, 2), Special::ColorBomb),
            ])
        );
    }

    #[test]
    fn t_shape_intersection_in_run_middle() {
        let grid = Grid::from_rows(&[
            &[2, 2, 2, 1, 0],
            &[1, 2, 0, 3, 1],
            &[0, 2, 1, 0, 3],
            &[3, 0, 3, 1, 0],
            &[1, 3, 0, 3, 1],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].pos, Pos::new(0, 1));
        assert_eq!(report.candidates[0].kind, Special::Wrapped);
    }

    #[test]
    fn empty_cells_and_bombs_break_runs() {
        let mut grid = Grid::from_rows(&[&[0, 0, 0, 0], &[1, 2, 1, 2], &[2, 1, 2, 1], &[1, 2, 1, 2]]);
        grid.set(Pos::new(0, 1), None);
        assert!(find_matches(&grid).is_empty());

        grid.set(
            Pos::new(0, 1),
            Some(Token {
                color: 0,
                special: Special::ColorBomb,
            }),
        );
        assert!(find_matches(&grid).is_empty());
    }

    #[test]
    fn specials_still_match_by_base_colour() {
        let mut grid = Grid::from_rows(&[&[0, 0, 0], &[1, 2, 1], &[2, 1, 2]]);
        grid.promote(Pos::new(0, 1), Special::StripedVertical);
        assert_eq!(find_matches(&grid).matched.len(), 3);
    }
}
