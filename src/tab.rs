//! The incremental constraint tableau.
//!
//! A [`Tableau`] maintains a growing system of linear inequalities
//! (equalities enter as two opposed inequalities) and division columns
//! over the rational relaxation of an integer set. It answers
//! feasibility and redundancy queries and supports snapshot/rollback
//! through an undo log, so a backtracking search can discard one branch
//! in time proportional to what the branch added.
//!
//! Feasibility and constraint implication are decided by exact
//! Fourier-Motzkin elimination over arbitrary-precision integers; added
//! rows are first tightened by the gcd of their coefficients, which is
//! exact for integer sets and sharpens the relaxation.

use log::trace;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use crate::basic::{BasicMap, Div};
use crate::space::Space;
use crate::vector::{
    expand_row, is_constant_row, negated, reduce_rational, tighten_ineq, zero_row, Int,
};

/// One constraint row with its bookkeeping flags.
#[derive(Debug, Clone)]
struct TabRow {
    row: Vec<Int>,
    frozen: bool,
    redundant: bool,
}

/// A recorded mutation, undone in reverse order on rollback.
#[derive(Debug)]
enum UndoOp {
    /// A constraint row was appended; `made_empty` records whether that
    /// addition flipped the tableau to infeasible.
    AddRow { made_empty: bool },
    /// A division column was appended (its floor rows are separate
    /// `AddRow` entries).
    AddDiv,
    /// Constraint `index` went from unfrozen to frozen.
    Freeze { index: usize },
    /// Constraint `index` was marked redundant.
    MarkRedundant { index: usize },
}

/// An opaque rollback token: a position in the undo log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

/// The incremental constraint system.
#[derive(Debug)]
pub struct Tableau {
    /// Non-division dimension count (parameters, inputs, outputs).
    dim: usize,
    /// Current row width: `1 + dim + divs.len()`.
    cols: usize,
    rows: Vec<TabRow>,
    divs: Vec<Div>,
    empty: bool,
    log: Vec<UndoOp>,
}

/// Outcome of an exact linear minimization.
enum Opt {
    Infeasible,
    Unbounded,
    Value(BigRational),
}

impl Tableau {
    /// Seed a tableau from a basic map: its divisions become columns,
    /// its equalities two opposed rows each, and every division
    /// contributes its two floor-relation rows.
    pub fn from_basic_map(bmap: &BasicMap) -> Self {
        let dim = bmap.space().dim_total();
        let mut tab = Tableau {
            dim,
            cols: bmap.width(),
            rows: Vec::new(),
            divs: bmap.divs().to_vec(),
            empty: false,
            log: Vec::new(),
        };
        for idx in 0..tab.divs.len() {
            let (lower, upper) = tab.floor_rows(idx);
            tab.add_ineq(&lower);
            tab.add_ineq(&upper);
        }
        for eq in bmap.eqs() {
            tab.add_ineq(eq);
            tab.add_ineq(&negated(eq));
            if tab.empty {
                break;
            }
        }
        if !tab.empty {
            for ineq in bmap.ineqs() {
                tab.add_ineq(ineq);
                if tab.empty {
                    break;
                }
            }
        }
        tab
    }

    /// True when the accumulated constraints are infeasible.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Number of constraint rows currently present.
    pub fn n_cons(&self) -> usize {
        self.rows.len()
    }

    /// Current row width.
    pub fn width(&self) -> usize {
        self.cols
    }

    /// Append one inequality `row · (1, x) >= 0`.
    ///
    /// The row is tightened by the gcd of its coefficients before it is
    /// added. Infeasibility is recorded in the `empty` flag, never
    /// reported as an error.
    pub fn add_ineq(&mut self, row: &[Int]) {
        debug_assert_eq!(row.len(), self.cols);
        let mut row = row.to_vec();
        tighten_ineq(&mut row);
        let mut made_empty = false;
        if !self.empty {
            let infeasible = if is_constant_row(&row) {
                row[0].is_negative()
            } else {
                let mut system = self.active_rows();
                system.push(&row);
                !feasible(system, self.cols - 1)
            };
            if infeasible {
                self.empty = true;
                made_empty = true;
            }
        }
        self.rows.push(TabRow {
            row,
            frozen: false,
            redundant: false,
        });
        self.log.push(UndoOp::AddRow { made_empty });
    }

    /// Add a division column, reusing a structurally equal existing
    /// division when there is one. Returns the division's index.
    ///
    /// The defining row must have the current width; its coefficient
    /// for the new column itself is implicitly zero.
    pub fn add_div(&mut self, denom: &Int, row: &[Int]) -> usize {
        debug_assert_eq!(row.len(), self.cols);
        debug_assert!(denom.is_positive());
        if let Some(idx) = self.find_div(denom, row) {
            return idx;
        }
        for tr in self.rows.iter_mut() {
            tr.row.push(Int::zero());
        }
        for div in self.divs.iter_mut() {
            div.row.push(Int::zero());
        }
        let mut def = row.to_vec();
        def.push(Int::zero());
        self.cols += 1;
        self.divs.push(Div {
            denom: denom.clone(),
            row: def,
        });
        self.log.push(UndoOp::AddDiv);
        let idx = self.divs.len() - 1;
        let (lower, upper) = self.floor_rows(idx);
        self.add_ineq(&lower);
        self.add_ineq(&upper);
        idx
    }

    /// Search for a structurally equal division.
    fn find_div(&self, denom: &Int, row: &[Int]) -> Option<usize> {
        self.divs
            .iter()
            .position(|d| &d.denom == denom && d.row[..self.cols] == *row)
    }

    /// The two rows enforcing `q = floor(e / d)` for division `idx`:
    /// `e - d*q >= 0` and `d*q - e + (d - 1) >= 0`.
    fn floor_rows(&self, idx: usize) -> (Vec<Int>, Vec<Int>) {
        let div = &self.divs[idx];
        let col = 1 + self.dim + idx;
        let mut lower = div.row.clone();
        lower[col] -= &div.denom;
        let mut upper = negated(&div.row);
        upper[col] += &div.denom;
        upper[0] += &div.denom - 1;
        (lower, upper)
    }

    /// Align the divisions of `bmap` onto this tableau's numbering,
    /// adding columns for divisions not yet present. Returns the map
    /// from `bmap`'s division indices to tableau division indices.
    pub fn align_divs(&mut self, bmap: &BasicMap) -> Vec<usize> {
        debug_assert_eq!(bmap.space().dim_total(), self.dim);
        let dim = self.dim;
        let mut div_map = Vec::with_capacity(bmap.n_div());
        for (i, div) in bmap.divs().iter().enumerate() {
            let mut row = zero_row(self.cols);
            row[..1 + dim].clone_from_slice(&div.row[..1 + dim]);
            for (j, &col) in div_map.iter().enumerate().take(i) {
                row[1 + dim + col] = div.row[1 + dim + j].clone();
            }
            div_map.push(self.add_div(&div.denom, &row));
        }
        div_map
    }

    /// Expand a constraint row of `bmap` into this tableau's numbering
    /// using a division map from [`Tableau::align_divs`].
    pub fn expand(&self, row: &[Int], div_map: &[usize]) -> Vec<Int> {
        expand_row(row, self.dim, div_map, self.cols)
    }

    /// Freeze one constraint: it will never be reported redundant.
    pub fn freeze(&mut self, index: usize) {
        if !self.rows[index].frozen {
            self.rows[index].frozen = true;
            self.log.push(UndoOp::Freeze { index });
        }
    }

    /// Freeze every constraint currently present.
    pub fn freeze_all(&mut self) {
        for index in 0..self.rows.len() {
            self.freeze(index);
        }
    }

    /// Detect constraints implied by the rest of the system. Only
    /// non-frozen constraints are candidates; each detected constraint
    /// is excluded from the system used to test the following ones.
    pub fn detect_redundant(&mut self) {
        if self.empty {
            return;
        }
        let mut found = 0usize;
        for i in 0..self.rows.len() {
            if self.rows[i].frozen || self.rows[i].redundant {
                continue;
            }
            let others: Vec<&[Int]> = self
                .rows
                .iter()
                .enumerate()
                .filter(|&(j, r)| j != i && !r.redundant)
                .map(|(_, r)| r.row.as_slice())
                .collect();
            let implied = match minimum(&others, self.cols - 1, &self.rows[i].row) {
                Opt::Infeasible => true,
                Opt::Unbounded => false,
                Opt::Value(min) => !min.is_negative(),
            };
            if implied {
                self.rows[i].redundant = true;
                self.log.push(UndoOp::MarkRedundant { index: i });
                found += 1;
            }
        }
        trace!(
            "redundancy scan: {} of {} constraints implied",
            found,
            self.rows.len()
        );
    }

    /// Whether constraint `index` was marked redundant by the last
    /// detection pass still in effect.
    pub fn is_redundant(&self, index: usize) -> bool {
        self.rows[index].redundant
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.log.len())
    }

    /// Restore the state captured by `snap`, discarding everything
    /// added after it. Cost is proportional to the discarded delta.
    pub fn rollback(&mut self, snap: Snapshot) {
        debug_assert!(snap.0 <= self.log.len());
        while self.log.len() > snap.0 {
            match self.log.pop().expect("undo log entry") {
                UndoOp::AddRow { made_empty } => {
                    self.rows.pop();
                    if made_empty {
                        self.empty = false;
                    }
                }
                UndoOp::AddDiv => {
                    self.divs.pop();
                    self.cols -= 1;
                    for tr in self.rows.iter_mut() {
                        tr.row.truncate(self.cols);
                    }
                    for div in self.divs.iter_mut() {
                        div.row.truncate(self.cols);
                    }
                }
                UndoOp::Freeze { index } => {
                    self.rows[index].frozen = false;
                }
                UndoOp::MarkRedundant { index } => {
                    self.rows[index].redundant = false;
                }
            }
        }
    }

    /// Materialize the accumulated region as a basic map over `space`.
    /// Redundant rows are dropped; the caller is expected to simplify.
    pub fn to_basic_map(&self, space: &Space) -> BasicMap {
        debug_assert_eq!(space.dim_total(), self.dim);
        let ineqs: Vec<Vec<Int>> = self
            .rows
            .iter()
            .filter(|r| !r.redundant)
            .map(|r| r.row.clone())
            .collect();
        BasicMap::from_parts(space.clone(), self.divs.clone(), Vec::new(), ineqs)
    }

    /// Rows participating in feasibility queries.
    fn active_rows(&self) -> Vec<&[Int]> {
        self.rows
            .iter()
            .filter(|r| !r.redundant)
            .map(|r| r.row.as_slice())
            .collect()
    }
}

/// Eliminate one variable column by Fourier-Motzkin combination.
/// Rows mentioning the column are replaced by one combined row per
/// (positive, negative) pair; the rest pass through.
fn fm_eliminate(rows: Vec<Vec<Int>>, col: usize) -> Vec<Vec<Int>> {
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    let mut rest = Vec::new();
    for row in rows {
        if row[col].is_positive() {
            pos.push(row);
        } else if row[col].is_negative() {
            neg.push(row);
        } else {
            rest.push(row);
        }
    }
    for p in &pos {
        for n in &neg {
            let a = p[col].clone();
            let b = -n[col].clone();
            let mut combined: Vec<Int> = p
                .iter()
                .zip(n)
                .map(|(pj, nj)| &b * pj + &a * nj)
                .collect();
            reduce_rational(&mut combined);
            rest.push(combined);
        }
    }
    rest
}

/// Exact rational feasibility of `rows` (each `row · (1, x) >= 0`) over
/// `n_vars` variables.
fn feasible(rows: Vec<&[Int]>, n_vars: usize) -> bool {
    let mut work: Vec<Vec<Int>> = rows.into_iter().map(|r| r.to_vec()).collect();
    for col in (1..=n_vars).rev() {
        work = fm_eliminate(work, col);
        if work
            .iter()
            .any(|row| is_constant_row(row) && row[0].is_negative())
        {
            return false;
        }
    }
    work.iter().all(|row| !row[0].is_negative())
}

/// Exact minimum of `obj · (1, x)` subject to `rows`, over the rational
/// relaxation.
fn minimum(rows: &[&[Int]], n_vars: usize, obj: &[Int]) -> Opt {
    let width = 1 + n_vars;
    let t = width;
    // Widen every row by a column for t and tie t to the objective.
    let mut work: Vec<Vec<Int>> = rows
        .iter()
        .map(|r| {
            let mut row = r.to_vec();
            row.push(Int::zero());
            row
        })
        .collect();
    let mut t_minus_obj = negated(obj);
    t_minus_obj.push(Int::from(1));
    let mut obj_minus_t = obj.to_vec();
    obj_minus_t.push(Int::from(-1));
    work.push(t_minus_obj);
    work.push(obj_minus_t);

    for col in (1..=n_vars).rev() {
        work = fm_eliminate(work, col);
    }

    let mut lower: Option<BigRational> = None;
    let mut upper: Option<BigRational> = None;
    for row in &work {
        let a = &row[t];
        let c = &row[0];
        if a.is_zero() {
            if c.is_negative() {
                return Opt::Infeasible;
            }
            continue;
        }
        // a*t + c >= 0: a bound of t at -c/a.
        let bound = BigRational::new(-c.clone(), a.clone());
        if a.is_positive() {
            lower = Some(match lower {
                Some(lb) if lb >= bound => lb,
                _ => bound,
            });
        } else {
            upper = Some(match upper {
                Some(ub) if ub <= bound => ub,
                _ => bound,
            });
        }
    }
    match (lower, upper) {
        (Some(lb), Some(ub)) if lb > ub => Opt::Infeasible,
        (Some(lb), _) => Opt::Value(lb),
        (None, _) => Opt::Unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Space;
    use crate::vector::row_from_i64;

    fn interval_tab(lo: i64, hi: i64) -> Tableau {
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_lower_bound(0, lo);
        bmap.add_upper_bound(0, hi);
        Tableau::from_basic_map(&bmap)
    }

    #[test]
    fn test_feasibility() {
        let mut tab = interval_tab(0, 10);
        assert!(!tab.is_empty());
        // x <= -1 contradicts x >= 0
        tab.add_ineq(&row_from_i64(&[-1, -1]));
        assert!(tab.is_empty());
    }

    #[test]
    fn test_integer_tightening() {
        // 2x >= 1 and x <= 0 has a rational point but tightens away.
        let mut tab = Tableau::from_basic_map(&BasicMap::universe(Space::set(1)));
        tab.add_ineq(&row_from_i64(&[-1, 2]));
        tab.add_ineq(&row_from_i64(&[0, -1]));
        assert!(tab.is_empty());
    }

    #[test]
    fn test_snapshot_rollback() {
        let mut tab = interval_tab(0, 10);
        let snap = tab.snapshot();
        let before = tab.n_cons();
        tab.add_ineq(&row_from_i64(&[-20, 1]));
        assert!(tab.is_empty());
        tab.rollback(snap);
        assert!(!tab.is_empty());
        assert_eq!(tab.n_cons(), before);
    }

    #[test]
    fn test_redundancy_detection() {
        let mut tab = interval_tab(0, 10);
        tab.freeze_all();
        // x >= -5 is implied by x >= 0; x <= 7 is not implied.
        tab.add_ineq(&row_from_i64(&[5, 1]));
        tab.add_ineq(&row_from_i64(&[7, -1]));
        let implied = tab.n_cons() - 2;
        let binding = tab.n_cons() - 1;
        tab.detect_redundant();
        assert!(tab.is_redundant(implied));
        assert!(!tab.is_redundant(binding));
    }

    #[test]
    fn test_redundancy_rolls_back() {
        let mut tab = interval_tab(0, 10);
        tab.freeze_all();
        let snap = tab.snapshot();
        tab.add_ineq(&row_from_i64(&[5, 1]));
        let idx = tab.n_cons() - 1;
        tab.detect_redundant();
        assert!(tab.is_redundant(idx));
        tab.rollback(snap);
        assert_eq!(tab.n_cons(), idx);
    }

    #[test]
    fn test_duplicate_rows_not_both_redundant() {
        let mut tab = Tableau::from_basic_map(&BasicMap::universe(Space::set(1)));
        // The same lower bound twice: only one may be discarded.
        tab.add_ineq(&row_from_i64(&[0, 1]));
        tab.add_ineq(&row_from_i64(&[0, 1]));
        tab.detect_redundant();
        let marked = (0..tab.n_cons()).filter(|&i| tab.is_redundant(i)).count();
        assert_eq!(marked, 1);
    }

    #[test]
    fn test_div_reuse() {
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_div(Int::from(2), row_from_i64(&[0, 1]));
        let mut tab = Tableau::from_basic_map(&bmap);
        let before = tab.width();
        // Adding the structurally same division reuses the column.
        let idx = tab.add_div(&Int::from(2), &row_from_i64(&[0, 1, 0]));
        assert_eq!(idx, 0);
        assert_eq!(tab.width(), before);
        // A different division gets a fresh column.
        let idx = tab.add_div(&Int::from(3), &row_from_i64(&[0, 1, 0]));
        assert_eq!(idx, 1);
        assert_eq!(tab.width(), before + 1);
    }

    #[test]
    fn test_rollback_removes_div_column() {
        let mut tab = Tableau::from_basic_map(&BasicMap::universe(Space::set(1)));
        let snap = tab.snapshot();
        tab.add_div(&Int::from(2), &row_from_i64(&[0, 1]));
        assert_eq!(tab.width(), 3);
        tab.rollback(snap);
        assert_eq!(tab.width(), 2);
        assert_eq!(tab.n_cons(), 0);
    }
}
