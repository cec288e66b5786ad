//! Promotion rules: reduce raw candidates to at most one special per cell.

use super::grid::{Pos, Special};
use super::matcher::{Candidate, Run};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// How many of a run's cells may be promoted. A run of five or more can carry both its bomb and
/// a wrapped crossing and still leave three cells to remove.
fn promotion_budget(run: &Run) -> usize {
    if run.len >= 5 { 2 } else { 1 }
}

/// Single deterministic reduction over the candidate list.
///
/// Candidates are taken in priority order (wrapped, colour bomb, striped), ties broken by
/// position. A candidate is dropped if its cell already holds a promotion or if any run it came
/// from has used up its promotion budget, so every run keeps cells to remove.
pub fn resolve_candidates(candidates: &[Candidate], runs: &[Run]) -> BTreeMap<Pos, Special> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (Reverse(c.kind.priority()), c.pos));

    let mut budget: Vec<usize> = runs.iter().map(promotion_budget).collect();
    let mut promoted = BTreeMap::new();
    for candidate in ordered {
        if promoted.contains_key(&candidate.pos) {
            continue;
        }
        let sources = candidate.runs.iter().flatten().copied();
        if sources.clone().any(|r| budget.get(r).is_none_or(|&left| left == 0)) {
            continue;
        }
        for r in sources {
            budget[r] -= 1;
        }
        promoted.insert(candidate.pos, candidate.kind);
    }
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Grid;
    use crate::game::matcher::find_matches;

    use crate::game::matcher::Axis;

    fn candidate(row: usize, col: usize, kind: Special, runs: [Option<usize>; 2]) -> Candidate {
        Candidate {
            pos: Pos::new(row, col),
            kind,
            runs,
        }
    }

    /// Placeholder runs; only their lengths matter to the reduction.
    fn runs(lens: &[usize]) -> Vec<Run> {
        lens.iter()
            .enumerate()
            .map(|(line, &len)| Run {
                axis: Axis::Horizontal,
                line,
                start: 0,
                len,
                color: 0,
            })
            .collect()
    }

    #[test]
    fn priority_wins_on_shared_cell() {
        let raw = [
            candidate(2, 2, Special::StripedHorizontal, [Some(0), None]),
            candidate(2, 2, Special::ColorBomb, [Some(1), None]),
            candidate(2, 2, Special::Wrapped, [Some(2), Some(3)]),
        ];
        let resolved = resolve_candidates(&raw, &runs(&[4, 5, 3, 3]));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[&Pos::new(2, 2)], Special::Wrapped);
    }

    #[test]
    fn bomb_beats_striped_regardless_of_input_order() {
        let a = candidate(1, 1, Special::StripedVertical, [Some(0), None]);
        let b = candidate(1, 1, Special::ColorBomb, [Some(1), None]);
        let lens = runs(&[4, 5]);
        assert_eq!(resolve_candidates(&[a, b], &lens), resolve_candidates(&[b, a], &lens));
        assert_eq!(resolve_candidates(&[a, b], &lens)[&Pos::new(1, 1)], Special::ColorBomb);
    }

    #[test]
    fn one_promotion_per_short_run() {
        let raw = [
            candidate(0, 0, Special::Wrapped, [Some(0), Some(3)]),
            candidate(0, 1, Special::Wrapped, [Some(0), Some(4)]),
            candidate(1, 1, Special::Wrapped, [Some(1), Some(4)]),
        ];
        let resolved = resolve_candidates(&raw, &runs(&[3, 3, 3, 3, 3]));
        assert_eq!(resolved.len(), 2);
        assert!(resolved.contains_key(&Pos::new(0, 0)));
        assert!(resolved.contains_key(&Pos::new(1, 1)));
    }

    #[test]
    fn solid_block_still_removes_cells() {
        let grid = Grid::from_rows(&[
            &[4, 4, 4, 0, 1],
            &[4, 4, 4, 1, 0],
            &[4, 4, 4, 0, 1],
            &[0, 1, 0, 1, 0],
            &[1, 0, 1, 0, 1],
        ]);
        let report = find_matches(&grid);
        assert_eq!(report.matched.len(), 9);
        let resolved = resolve_candidates(&report.candidates, &report.runs);
        assert_eq!(resolved.len(), 3);
        assert!(resolved.values().all(|&k| k == Special::Wrapped));
    }

    #[test]
    fn crossed_five_run_keeps_bomb_and_wrapped() {
        let grid = Grid::from_rows(&[
            &[5, 5, 5, 5, 5],
            &[1, 2, 1, 2, 5],
            &[2, 1, 2, 1, 5],
            &[1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2],
        ]);
        let report = find_matches(&grid);
        let resolved = resolve_candidates(&report.candidates, &report.runs);
        assert_eq!(
            resolved,
            BTreeMap::from([
                (Pos::new(0, 2), Special::ColorBomb),
                (Pos::new(0, 4), Special::Wrapped),
            ])
        );
    }

    #[test]
    fn bomb_on_the_wrapped_cell_gives_way() {
        let raw = [
            candidate(2, 2, Special::ColorBomb, [Some(0), None]),
            candidate(2, 2, Special::Wrapped, [Some(0), Some(1)]),
        ];
        let resolved = resolve_candidates(&raw, &runs(&[5, 3]));
        assert_eq!(resolved, BTreeMap::from([(Pos::new(2, 2), Special::Wrapped)]));
    }

    #[test]
    fn solid_five_block_leaves_three_cells_per_run() {
        let rows = [[3u8; 5]; 5];
        let rows: Vec<&[u8]> = rows.iter().map(|r| r.as_slice()).collect();
        let grid = Grid::from_rows(&rows);
        let report = find_matches(&grid);
        assert_eq!(report.runs.len(), 10);
        let resolved = resolve_candidates(&report.candidates, &report.runs);
        assert!(!resolved.is_empty());
        for run in &report.runs {
            let kept = run.cells().filter(|p| !resolved.contains_key(p)).count();
            assert!(kept >= 3, "{run:?} keeps {kept}");
        }
    }
}
