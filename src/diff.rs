//! The backtracking set-difference engine.
//!
//! [`collect_diff`] computes `A \ (B_1 ∪ ... ∪ B_n)` for one basic map
//! `A` against the pieces of a disjunctive map, handing each resulting
//! piece to a collector. Each recursion level corresponds to one `B_i`.
//! Entering a level for the first time checks whether `B_i` intersects
//! the current region at all; if it does, the region is split into as
//! many pieces as there are non-redundant constraints of `B_i` in the
//! intersection: piece `i` keeps constraints `0..i` and adds the
//! opposite of constraint `i`. A level with no non-redundant
//! constraints means the region is entirely inside `B_i` and
//! contributes nothing.
//!
//! At the leaves the remaining region is materialized, simplified, and
//! passed along when non-empty; if no right-hand constraint was ever
//! added anywhere, the original `A` is passed along unchanged.
//!
//! Branches are explored in ascending constraint order. The
//! decomposition this produces is valid but not canonical; only its
//! union is specified.

use log::debug;

use crate::basic::BasicMap;
use crate::error::Result;
use crate::tab::Tableau;
use crate::vector::{negated, opposite_ineq};

/// Collector verdict: keep walking or end the whole traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Walk {
    /// Keep producing pieces.
    Continue,
    /// Stop after this piece; used by the emptiness short-circuit.
    Stop,
}

/// Compute the difference of `bmap` and the union of `pieces`, calling
/// `collect` once per resulting piece. The collector's pieces are
/// pairwise disjoint. A collector error aborts the traversal with no
/// partial result exposed beyond what the collector already consumed.
pub(crate) fn collect_diff<F>(bmap: &BasicMap, pieces: &[BasicMap], collect: &mut F) -> Result<()>
where
    F: FnMut(BasicMap) -> Result<Walk>,
{
    if bmap.is_empty() {
        return Ok(());
    }
    let tab = Tableau::from_basic_map(bmap);
    let mut search = DiffSearch {
        tab,
        pieces,
        original: bmap,
        modified: false,
        collect,
    };
    search.descend(0)?;
    Ok(())
}

/// All pieces of `bmap \ (pieces_1 ∪ ...)`, pairwise disjoint.
pub(crate) fn basic_map_subtract(bmap: &BasicMap, pieces: &[BasicMap]) -> Result<Vec<BasicMap>> {
    let mut out = Vec::new();
    collect_diff(bmap, pieces, &mut |piece| {
        out.push(piece);
        Ok(Walk::Continue)
    })?;
    Ok(out)
}

/// Whether `bmap \ (pieces_1 ∪ ...)` is empty, stopping at the first
/// witness piece.
pub(crate) fn basic_diff_is_empty(bmap: &BasicMap, pieces: &[BasicMap]) -> Result<bool> {
    let mut empty = true;
    collect_diff(bmap, pieces, &mut |_piece| {
        empty = false;
        Ok(Walk::Stop)
    })?;
    Ok(empty)
}

struct DiffSearch<'a, F> {
    tab: Tableau,
    pieces: &'a [BasicMap],
    original: &'a BasicMap,
    /// Whether any right-hand constraint was added on any path so far.
    modified: bool,
    collect: &'a mut F,
}

impl<F> DiffSearch<'_, F>
where
    F: FnMut(BasicMap) -> Result<Walk>,
{
    fn descend(&mut self, level: usize) -> Result<Walk> {
        if level == self.pieces.len() {
            return self.leaf();
        }
        let pieces = self.pieces;
        let piece = &pieces[level];
        let outer = self.tab.snapshot();
        let div_map = self.tab.align_divs(piece);
        let snap = self.tab.snapshot();
        let offset = self.tab.n_cons();
        self.tab.freeze_all();
        self.add_piece_rows(piece, &div_map);
        if self.tab.is_empty() {
            // This piece does not intersect the current region.
            self.tab.rollback(outer);
            return self.descend(level + 1);
        }
        self.modified = true;
        self.tab.detect_redundant();
        let candidates: Vec<usize> = (offset..self.tab.n_cons())
            .filter(|&i| !self.tab.is_redundant(i))
            .map(|i| i - offset)
            .collect();
        if candidates.is_empty() {
            // The region is entirely inside this piece; nothing of it
            // survives the difference. The caller rolls back.
            return Ok(Walk::Continue);
        }
        debug!(
            "difference: level {} splits on {} of {} constraints",
            level,
            candidates.len(),
            self.tab.n_cons() - offset
        );
        self.tab.rollback(snap);
        self.add_branch_row(piece, &div_map, candidates[0], true);
        if let Walk::Stop = self.descend(level + 1)? {
            return Ok(Walk::Stop);
        }
        let mut snap_level = snap;
        for k in 1..candidates.len() {
            self.tab.rollback(snap_level);
            self.add_branch_row(piece, &div_map, candidates[k - 1], false);
            snap_level = self.tab.snapshot();
            self.add_branch_row(piece, &div_map, candidates[k], true);
            if let Walk::Stop = self.descend(level + 1)? {
                return Ok(Walk::Stop);
            }
        }
        Ok(Walk::Continue)
    }

    fn leaf(&mut self) -> Result<Walk> {
        if !self.modified {
            // No right-hand piece touched the region: the difference is
            // the original, in one piece.
            (self.collect)(self.original.clone())?;
            return Ok(Walk::Stop);
        }
        if self.tab.is_empty() {
            return Ok(Walk::Continue);
        }
        let mut piece = self.tab.to_basic_map(self.original.space());
        piece.simplify();
        if piece.is_empty() {
            return Ok(Walk::Continue);
        }
        (self.collect)(piece)
    }

    /// Add every constraint of `piece`, equalities as two opposed
    /// inequalities, stopping early once infeasible.
    fn add_piece_rows(&mut self, piece: &BasicMap, div_map: &[usize]) {
        for eq in piece.eqs() {
            let row = self.tab.expand(eq, div_map);
            self.tab.add_ineq(&row);
            let row = self.tab.expand(&negated(eq), div_map);
            self.tab.add_ineq(&row);
            if self.tab.is_empty() {
                return;
            }
        }
        for ineq in piece.ineqs() {
            let row = self.tab.expand(ineq, div_map);
            self.tab.add_ineq(&row);
            if self.tab.is_empty() {
                return;
            }
        }
    }

    /// Add constraint `c` of `piece` in batch numbering (equalities
    /// count twice, once per polarity), or its integer opposite.
    fn add_branch_row(&mut self, piece: &BasicMap, div_map: &[usize], c: usize, oppose: bool) {
        let n_eq_rows = 2 * piece.n_eq();
        let mut row = if c < n_eq_rows {
            let base = &piece.eqs()[c / 2];
            if c % 2 == 1 {
                negated(base)
            } else {
                base.clone()
            }
        } else {
            piece.ineqs()[c - n_eq_rows].clone()
        };
        if oppose {
            row = opposite_ineq(&row);
        }
        let expanded = self.tab.expand(&row, div_map);
        self.tab.add_ineq(&expanded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Space;

    fn interval(lo: i64, hi: i64) -> BasicMap {
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_lower_bound(0, lo);
        bmap.add_upper_bound(0, hi);
        bmap
    }

    fn points_of(pieces: &[BasicMap], lo: i64, hi: i64) -> Vec<i64> {
        use crate::point::Point;
        (lo..=hi)
            .filter(|&v| {
                pieces
                    .iter()
                    .any(|p| p.contains(&Point::from_i64(Space::set(1), &[v])))
            })
            .collect()
    }

    #[test]
    fn test_middle_band_survives() {
        let a = interval(0, 10);
        let b = vec![interval(-100, 3), interval(8, 100)];
        let diff = basic_map_subtract(&a, &b).unwrap();
        assert_eq!(points_of(&diff, -20, 20), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_self_difference_is_empty() {
        let a = interval(0, 10);
        let diff = basic_map_subtract(&a, &[a.clone()]).unwrap();
        assert!(diff.is_empty());
        assert!(basic_diff_is_empty(&a, &[a.clone()]).unwrap());
    }

    #[test]
    fn test_empty_right_side_returns_original() {
        let a = interval(0, 10);
        let diff = basic_map_subtract(&a, &[]).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(points_of(&diff, -5, 15), (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_disjoint_right_side_leaves_original_piece() {
        let a = interval(0, 5);
        let b = vec![interval(20, 30)];
        let diff = basic_map_subtract(&a, &b).unwrap();
        // Nothing was removed, so the original comes back unsplit.
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0], a);
    }

    #[test]
    fn test_pieces_are_disjoint() {
        let a = interval(0, 10);
        let b = vec![interval(4, 6)];
        let diff = basic_map_subtract(&a, &b).unwrap();
        assert_eq!(points_of(&diff, -5, 15), vec![0, 1, 2, 3, 7, 8, 9, 10]);
        // Every surviving integer lies in exactly one piece.
        use crate::point::Point;
        for v in [0i64, 3, 7, 10] {
            let hits = diff
                .iter()
                .filter(|p| p.contains(&Point::from_i64(Space::set(1), &[v])))
                .count();
            assert_eq!(hits, 1, "value {} covered once", v);
        }
    }

    #[test]
    fn test_short_circuit_agrees_with_full_collection() {
        let a = interval(0, 10);
        let cases = vec![
            vec![interval(-5, 20)],
            vec![interval(0, 4), interval(5, 10)],
            vec![interval(0, 4), interval(6, 10)],
            vec![],
        ];
        for pieces in cases {
            let full = basic_map_subtract(&a, &pieces).unwrap();
            let all_empty = full.iter().all(|p| p.is_empty());
            let short = basic_diff_is_empty(&a, &pieces).unwrap();
            assert_eq!(short, all_empty);
        }
    }
}
