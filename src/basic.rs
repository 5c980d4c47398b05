//! Basic sets and maps: a single conjunction of linear constraints.
//!
//! A [`BasicMap`] owns equality rows, inequality rows, and division
//! definitions over a [`Space`]. Every row has exactly
//! `1 + n_param + n_in + n_out + n_div` entries, laid out as
//! `[constant, params..., inputs..., outputs..., divisions...]`.
//!
//! Division definitions may reference earlier divisions only.

use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{PolysetError, Result};
use crate::point::Point;
use crate::space::{Reordering, Space};
use crate::tab::Tableau;
use crate::vector::{
    dot, eliminate, expand_row, floor_div, is_constant_row, negated, normalize_eq, row_from_i64,
    tighten_ineq, zero_row, Int,
};

/// An existentially quantified division dimension, defined as
/// `floor((row · (1, x)) / denom)` with `denom > 0`.
///
/// The defining row always has the full current width of its owner; the
/// coefficients for the division itself and for later divisions are
/// zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Div {
    /// The positive denominator.
    pub denom: Int,
    /// The defining numerator row.
    pub row: Vec<Int>,
}

/// A conjunction of equalities, inequalities, and divisions over a
/// space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicMap {
    space: Space,
    divs: Vec<Div>,
    eqs: Vec<Vec<Int>>,
    ineqs: Vec<Vec<Int>>,
}

impl BasicMap {
    /// The unconstrained basic map over `space`.
    pub fn universe(space: Space) -> Self {
        Self {
            space,
            divs: Vec::new(),
            eqs: Vec::new(),
            ineqs: Vec::new(),
        }
    }

    /// The canonical empty basic map over `space`.
    pub fn empty(space: Space) -> Self {
        let mut bmap = Self::universe(space);
        bmap.set_empty();
        bmap
    }

    /// Assemble a basic map from already-expanded parts. Internal:
    /// callers must guarantee consistent row widths.
    pub(crate) fn from_parts(
        space: Space,
        divs: Vec<Div>,
        eqs: Vec<Vec<Int>>,
        ineqs: Vec<Vec<Int>>,
    ) -> Self {
        let bmap = Self {
            space,
            divs,
            eqs,
            ineqs,
        };
        debug_assert!(bmap
            .eqs
            .iter()
            .chain(bmap.ineqs.iter())
            .all(|row| row.len() == bmap.width()));
        debug_assert!(bmap.divs.iter().all(|d| d.row.len() == bmap.width()));
        bmap
    }

    /// The space this basic map lives in.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Division definitions.
    pub fn divs(&self) -> &[Div] {
        &self.divs
    }

    /// Equality rows.
    pub fn eqs(&self) -> &[Vec<Int>] {
        &self.eqs
    }

    /// Inequality rows.
    pub fn ineqs(&self) -> &[Vec<Int>] {
        &self.ineqs
    }

    /// Number of equality rows.
    pub fn n_eq(&self) -> usize {
        self.eqs.len()
    }

    /// Number of inequality rows.
    pub fn n_ineq(&self) -> usize {
        self.ineqs.len()
    }

    /// Number of divisions.
    pub fn n_div(&self) -> usize {
        self.divs.len()
    }

    /// Total dimension count including divisions.
    pub fn total_dim(&self) -> usize {
        self.space.dim_total() + self.divs.len()
    }

    /// Row width: one constant column plus one column per dimension.
    pub fn width(&self) -> usize {
        1 + self.total_dim()
    }

    /// Add an equality row `row · (1, x) == 0`.
    pub fn add_eq(&mut self, row: Vec<Int>) {
        assert_eq!(row.len(), self.width());
        self.eqs.push(row);
    }

    /// Add an inequality row `row · (1, x) >= 0`.
    pub fn add_ineq(&mut self, row: Vec<Int>) {
        assert_eq!(row.len(), self.width());
        self.ineqs.push(row);
    }

    /// Add an equality row from machine integers.
    pub fn add_eq_i64(&mut self, row: &[i64]) {
        self.add_eq(row_from_i64(row));
    }

    /// Add an inequality row from machine integers.
    pub fn add_ineq_i64(&mut self, row: &[i64]) {
        self.add_ineq(row_from_i64(row));
    }

    /// Constrain variable column `var` (0-based over params, inputs,
    /// outputs) to be at least `bound`.
    pub fn add_lower_bound(&mut self, var: usize, bound: i64) {
        assert!(var < self.space.dim_total());
        let mut row = zero_row(self.width());
        row[0] = Int::from(-bound);
        row[1 + var] = Int::from(1);
        self.ineqs.push(row);
    }

    /// Constrain variable column `var` to be at most `bound`.
    pub fn add_upper_bound(&mut self, var: usize, bound: i64) {
        assert!(var < self.space.dim_total());
        let mut row = zero_row(self.width());
        row[0] = Int::from(bound);
        row[1 + var] = Int::from(-1);
        self.ineqs.push(row);
    }

    /// Constrain variable column `var` to equal `value`.
    pub fn fix(&mut self, var: usize, value: i64) {
        assert!(var < self.space.dim_total());
        let mut row = zero_row(self.width());
        row[0] = Int::from(-value);
        row[1 + var] = Int::from(1);
        self.eqs.push(row);
    }

    /// Append a division `floor((row · (1, x)) / denom)` and return its
    /// index. The defining row must have the current width and may
    /// reference existing divisions only.
    pub fn add_div(&mut self, denom: Int, row: Vec<Int>) -> usize {
        assert!(denom.is_positive());
        assert_eq!(row.len(), self.width());
        self.grow_div_column();
        let mut row = row;
        row.push(Int::zero());
        self.divs.push(Div { denom, row });
        self.divs.len() - 1
    }

    /// Extend every stored row by one zero column for a new division.
    fn grow_div_column(&mut self) {
        for row in self.eqs.iter_mut().chain(self.ineqs.iter_mut()) {
            row.push(Int::zero());
        }
        for div in self.divs.iter_mut() {
            div.row.push(Int::zero());
        }
    }

    /// Replace all constraints with the canonical unsatisfiable row.
    pub fn set_empty(&mut self) {
        self.divs.clear();
        self.eqs.clear();
        self.ineqs.clear();
        let mut row = zero_row(self.width());
        row[0] = Int::from(-1);
        self.ineqs.push(row);
    }

    /// Detect emptiness from a single trivially false row.
    pub fn is_plain_empty(&self) -> bool {
        self.ineqs
            .iter()
            .any(|row| is_constant_row(row) && row[0].is_negative())
            || self
                .eqs
                .iter()
                .any(|row| is_constant_row(row) && !row[0].is_zero())
    }

    /// True when there are no constraints at all.
    pub fn is_universe(&self) -> bool {
        self.eqs.is_empty() && self.ineqs.is_empty()
    }

    /// Full emptiness test: simplification over the integers followed by
    /// feasibility of the tightened rational relaxation.
    pub fn is_empty(&self) -> bool {
        if self.is_plain_empty() {
            return true;
        }
        if self.is_universe() {
            return false;
        }
        let mut simplified = self.clone();
        simplified.simplify();
        if simplified.is_plain_empty() {
            return true;
        }
        if simplified.is_universe() {
            return false;
        }
        Tableau::from_basic_map(&simplified).is_empty()
    }

    /// Check whether a point satisfies every constraint. Division
    /// values are computed from their definitions.
    pub fn contains(&self, point: &Point) -> bool {
        debug_assert_eq!(point.space(), &self.space);
        let mut values = point.values().to_vec();
        values.resize(self.total_dim(), Int::zero());
        for (i, div) in self.divs.iter().enumerate() {
            let num = dot(&div.row, &values);
            values[self.space.dim_total() + i] = floor_div(&num, &div.denom);
        }
        self.eqs.iter().all(|row| dot(row, &values).is_zero())
            && self
                .ineqs
                .iter()
                .all(|row| !dot(row, &values).is_negative())
    }

    /// True when the constraints pin down exactly one tuple: no
    /// divisions, no inequalities, and one independent equality per
    /// dimension. Callers should simplify first.
    pub fn plain_is_singleton(&self) -> bool {
        self.divs.is_empty() && self.ineqs.is_empty() && self.eqs.len() == self.total_dim()
    }

    /// Extract the single element of a singleton basic map, if the
    /// equalities determine one integer point.
    pub fn singleton_point(&self) -> Option<Point> {
        if !self.plain_is_singleton() {
            return None;
        }
        let total = self.total_dim();
        let mut values = vec![Int::zero(); total];
        let mut known = vec![false; total];
        let mut remaining = total;
        while remaining > 0 {
            let mut progressed = false;
            for eq in &self.eqs {
                let mut unknown = None;
                let mut unknowns = 0;
                for j in 0..total {
                    if !known[j] && !eq[1 + j].is_zero() {
                        unknown = Some(j);
                        unknowns += 1;
                    }
                }
                let (Some(j), 1) = (unknown, unknowns) else {
                    continue;
                };
                let mut rhs = eq[0].clone();
                for (jj, value) in values.iter().enumerate() {
                    if known[jj] {
                        rhs += &eq[1 + jj] * value;
                    }
                }
                let coeff = &eq[1 + j];
                if !(&rhs % coeff).is_zero() {
                    return None;
                }
                values[j] = -(rhs / coeff);
                known[j] = true;
                remaining -= 1;
                progressed = true;
            }
            if !progressed {
                return None;
            }
        }
        Some(Point::new(self.space.clone(), values))
    }

    /// Simplify in place: gcd-normalize rows, eliminate variables using
    /// the equalities (exact integer Gauss elimination), tighten
    /// inequality constants, drop duplicates, and recover equalities
    /// from opposed inequality pairs. Detected inconsistency collapses
    /// to the canonical empty form.
    pub fn simplify(&mut self) {
        loop {
            if !self.normalize_eqs() {
                self.set_empty();
                return;
            }
            self.gauss();
            if !self.normalize_eqs() {
                self.set_empty();
                return;
            }
            match self.reduce_ineqs() {
                IneqReduction::Inconsistent => {
                    self.set_empty();
                    return;
                }
                IneqReduction::NewEqs(new_eqs) => {
                    self.eqs.extend(new_eqs);
                }
                IneqReduction::Stable => return,
            }
        }
    }

    /// Normalize equality rows; returns false on integer inconsistency.
    fn normalize_eqs(&mut self) -> bool {
        let mut ok = true;
        self.eqs.retain_mut(|row| {
            if !normalize_eq(row) {
                ok = false;
                return true;
            }
            !is_constant_row(row) || !row[0].is_zero()
        });
        ok
    }

    /// Use each independent equality to eliminate one variable column
    /// from all other rows, highest column first.
    fn gauss(&mut self) {
        let total = self.total_dim();
        let mut done = 0;
        for col in (1..=total).rev() {
            if done == self.eqs.len() {
                break;
            }
            let Some(pivot) = (done..self.eqs.len()).find(|&r| !self.eqs[r][col].is_zero())
            else {
                continue;
            };
            self.eqs.swap(done, pivot);
            let eq = self.eqs[done].clone();
            for (r, row) in self.eqs.iter_mut().enumerate() {
                if r != done {
                    eliminate(row, &eq, col);
                }
            }
            for row in self.ineqs.iter_mut() {
                eliminate(row, &eq, col);
            }
            done += 1;
        }
    }

    /// Tighten and deduplicate inequality rows; opposed pairs either
    /// prove inconsistency or yield a new equality.
    fn reduce_ineqs(&mut self) -> IneqReduction {
        let mut kept: Vec<Option<Vec<Int>>> = Vec::with_capacity(self.ineqs.len());
        let mut by_coeffs: HashMap<Vec<Int>, usize> = HashMap::new();
        let mut new_eqs = Vec::new();
        for mut row in self.ineqs.drain(..) {
            tighten_ineq(&mut row);
            if is_constant_row(&row) {
                if row[0].is_negative() {
                    return IneqReduction::Inconsistent;
                }
                continue;
            }
            let coeffs = row[1..].to_vec();
            if let Some(&slot) = by_coeffs.get(&coeffs) {
                // Parallel bounds: the smaller constant is the binding one.
                let prev = kept[slot].as_mut().expect("slot in use");
                if row[0] < prev[0] {
                    *prev = row;
                }
                continue;
            }
            let opposite = negated(&coeffs);
            if let Some(&slot) = by_coeffs.get(&opposite) {
                let prev = kept[slot].as_ref().expect("slot in use");
                let gap = &prev[0] + &row[0];
                if gap.is_negative() {
                    return IneqReduction::Inconsistent;
                }
                if gap.is_zero() {
                    // row >= 0 and -row >= 0: an equality.
                    new_eqs.push(prev.clone());
                    kept[slot] = None;
                    by_coeffs.remove(&opposite);
                    continue;
                }
            }
            by_coeffs.insert(coeffs, kept.len());
            kept.push(Some(row));
        }
        self.ineqs = kept.into_iter().flatten().collect();
        if new_eqs.is_empty() {
            IneqReduction::Stable
        } else {
            IneqReduction::NewEqs(new_eqs)
        }
    }

    /// Intersect with another basic map over the same space, merging
    /// its divisions into this one's numbering.
    pub fn intersect(mut self, other: &BasicMap) -> Result<BasicMap> {
        if self.space != other.space {
            return Err(PolysetError::space_mismatch(&self.space, &other.space));
        }
        let dim = self.space.dim_total();
        let mut div_map = Vec::with_capacity(other.divs.len());
        for (i, div) in other.divs.iter().enumerate() {
            let mut row = zero_row(self.width());
            row[..1 + dim].clone_from_slice(&div.row[..1 + dim]);
            for (j, &col) in div_map.iter().enumerate().take(i) {
                row[1 + dim + col] = div.row[1 + dim + j].clone();
            }
            let existing = self
                .divs
                .iter()
                .position(|d| d.denom == div.denom && d.row == row);
            match existing {
                Some(idx) => div_map.push(idx),
                None => div_map.push(self.add_div(div.denom.clone(), row)),
            }
        }
        let width = self.width();
        for eq in &other.eqs {
            self.eqs.push(expand_row(eq, dim, &div_map, width));
        }
        for ineq in &other.ineqs {
            self.ineqs.push(expand_row(ineq, dim, &div_map, width));
        }
        Ok(self)
    }

    /// Drop the constraints of `self` that are implied by `context`,
    /// leaving a basic map equivalent to `self` inside `context`.
    ///
    /// An equality is dropped only when both of its directions are
    /// implied. Gist with respect to an empty context is the universe.
    pub fn gist(self, context: &BasicMap) -> Result<BasicMap> {
        if self.space != context.space {
            return Err(PolysetError::space_mismatch(&self.space, &context.space));
        }
        if self.is_universe() {
            return Ok(self);
        }
        let mut tab = Tableau::from_basic_map(context);
        if tab.is_empty() {
            return Ok(BasicMap::universe(self.space));
        }
        let div_map = tab.align_divs(&self);
        tab.freeze_all();
        let offset = tab.n_cons();
        let dim = self.space.dim_total();
        for eq in &self.eqs {
            let row = expand_row(eq, dim, &div_map, tab.width());
            tab.add_ineq(&row);
            tab.add_ineq(&negated(&row));
        }
        for ineq in &self.ineqs {
            tab.add_ineq(&expand_row(ineq, dim, &div_map, tab.width()));
        }
        if tab.is_empty() {
            return Ok(BasicMap::empty(self.space));
        }
        tab.detect_redundant();
        let mut result = BasicMap::universe(self.space.clone());
        for div in &self.divs {
            result.divs.push(div.clone());
        }
        for (i, eq) in self.eqs.iter().enumerate() {
            let both = tab.is_redundant(offset + 2 * i) && tab.is_redundant(offset + 2 * i + 1);
            if !both {
                result.eqs.push(eq.clone());
            }
        }
        let ineq_offset = offset + 2 * self.eqs.len();
        for (i, ineq) in self.ineqs.iter().enumerate() {
            if !tab.is_redundant(ineq_offset + i) {
                result.ineqs.push(ineq.clone());
            }
        }
        Ok(result)
    }

    /// Re-express this basic map under an aligned parameter numbering.
    pub fn realign(&self, reorder: &Reordering) -> BasicMap {
        let old_n_param = self.space.n_param();
        let n_rest = self.total_dim() - old_n_param;
        let map_row = |row: &Vec<Int>| reorder.apply_to_row(row, old_n_param, n_rest);
        BasicMap {
            space: self.space.realign(reorder),
            divs: self
                .divs
                .iter()
                .map(|d| Div {
                    denom: d.denom.clone(),
                    row: map_row(&d.row),
                })
                .collect(),
            eqs: self.eqs.iter().map(map_row).collect(),
            ineqs: self.ineqs.iter().map(map_row).collect(),
        }
    }

    /// Embed a set over this map space's domain into the map space:
    /// the set's dimensions become the input dimensions, outputs are
    /// unconstrained.
    pub(crate) fn from_domain_set(set_piece: &BasicMap, map_space: &Space) -> BasicMap {
        debug_assert!(set_piece.space.is_set());
        debug_assert_eq!(set_piece.space.n_out(), map_space.n_in());
        let at = 1 + map_space.n_param() + map_space.n_in();
        Self::embed_set(set_piece, map_space, at, map_space.n_out())
    }

    /// Embed a set over this map space's range into the map space.
    pub(crate) fn from_range_set(set_piece: &BasicMap, map_space: &Space) -> BasicMap {
        debug_assert!(set_piece.space.is_set());
        debug_assert_eq!(set_piece.space.n_out(), map_space.n_out());
        let at = 1 + map_space.n_param();
        Self::embed_set(set_piece, map_space, at, map_space.n_in())
    }

    fn embed_set(set_piece: &BasicMap, map_space: &Space, at: usize, count: usize) -> BasicMap {
        let widen = |row: &Vec<Int>| {
            let mut out = row.clone();
            for _ in 0..count {
                out.insert(at, Int::zero());
            }
            out
        };
        BasicMap {
            space: map_space.clone(),
            divs: set_piece
                .divs
                .iter()
                .map(|d| Div {
                    denom: d.denom.clone(),
                    row: widen(&d.row),
                })
                .collect(),
            eqs: set_piece.eqs.iter().map(widen).collect(),
            ineqs: set_piece.ineqs.iter().map(widen).collect(),
        }
    }
}

enum IneqReduction {
    Stable,
    Inconsistent,
    NewEqs(Vec<Vec<Int>>),
}

impl fmt::Display for BasicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.column_names();
        write!(f, "{{ ")?;
        let mut first = true;
        for row in &self.eqs {
            if !first {
                write!(f, " and ")?;
            }
            first = false;
            write!(f, "{} = 0", render_affine(row, &names))?;
        }
        for row in &self.ineqs {
            if !first {
                write!(f, " and ")?;
            }
            first = false;
            write!(f, "{} >= 0", render_affine(row, &names))?;
        }
        if first {
            write!(f, "true")?;
        }
        write!(f, " }}")
    }
}

impl BasicMap {
    fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.total_dim());
        names.extend(self.space.params().iter().cloned());
        names.extend((0..self.space.n_in()).map(|i| format!("i{}", i)));
        names.extend((0..self.space.n_out()).map(|i| format!("o{}", i)));
        names.extend((0..self.divs.len()).map(|i| format!("e{}", i)));
        names
    }
}

fn render_affine(row: &[Int], names: &[String]) -> String {
    let mut parts = Vec::new();
    if !row[0].is_zero() {
        parts.push(row[0].to_string());
    }
    for (c, name) in row[1..].iter().zip(names) {
        if c.is_zero() {
            continue;
        }
        if *c == Int::from(1) {
            parts.push(name.clone());
        } else if *c == Int::from(-1) {
            parts.push(format!("-{}", name));
        } else {
            parts.push(format!("{}*{}", c, name));
        }
    }
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" + ").replace("+ -", "- ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(lo: i64, hi: i64) -> BasicMap {
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_lower_bound(0, lo);
        bmap.add_upper_bound(0, hi);
        bmap
    }

    #[test]
    fn test_universe_and_empty() {
        assert!(!BasicMap::universe(Space::set(2)).is_empty());
        assert!(BasicMap::empty(Space::set(2)).is_empty());
    }

    #[test]
    fn test_contains() {
        let bmap = interval(0, 10);
        assert!(bmap.contains(&Point::from_i64(Space::set(1), &[0])));
        assert!(bmap.contains(&Point::from_i64(Space::set(1), &[10])));
        assert!(!bmap.contains(&Point::from_i64(Space::set(1), &[11])));
    }

    #[test]
    fn test_contradictory_bounds_are_empty() {
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_lower_bound(0, 5);
        bmap.add_upper_bound(0, 4);
        assert!(bmap.is_empty());
    }

    #[test]
    fn test_divisibility_gap_is_empty() {
        // 2x = 1
        let mut bmap = BasicMap::universe(Space::set(1));
        bmap.add_eq_i64(&[-1, 2]);
        assert!(bmap.is_empty());
    }

    #[test]
    fn test_simplify_recovers_equality_from_pair() {
        // x >= 4 and x <= 4
        let mut bmap = interval(4, 4);
        bmap.simplify();
        assert_eq!(bmap.n_ineq(), 0);
        assert_eq!(bmap.n_eq(), 1);
        assert!(bmap.plain_is_singleton());
        let point = bmap.singleton_point().expect("one point");
        assert_eq!(point.values(), &[Int::from(4)]);
    }

    #[test]
    fn test_singleton_extraction_2d() {
        let mut bmap = BasicMap::universe(Space::set(2));
        // x = 3, y = x + 2
        bmap.fix(0, 3);
        bmap.add_eq_i64(&[2, 1, -1]);
        bmap.simplify();
        let point = bmap.singleton_point().expect("one point");
        assert_eq!(point.values(), &[Int::from(3), Int::from(5)]);
    }

    #[test]
    fn test_intersect() {
        let a = interval(0, 10);
        let b = interval(5, 20);
        let both = a.intersect(&b).unwrap();
        assert!(both.contains(&Point::from_i64(Space::set(1), &[7])));
        assert!(!both.contains(&Point::from_i64(Space::set(1), &[3])));
    }

    #[test]
    fn test_intersect_space_mismatch() {
        let a = BasicMap::universe(Space::set(1));
        let b = BasicMap::universe(Space::set(2));
        assert!(a.intersect(&b).is_err());
    }

    #[test]
    fn test_div_contains() {
        // e = floor(x / 2), x = 2e  (even numbers)
        let mut bmap = BasicMap::universe(Space::set(1));
        let d = bmap.add_div(Int::from(2), row_from_i64(&[0, 1]));
        let mut eq = zero_row(bmap.width());
        eq[1] = Int::from(1);
        eq[1 + 1 + d] = Int::from(-2);
        bmap.add_eq(eq);
        assert!(bmap.contains(&Point::from_i64(Space::set(1), &[4])));
        assert!(!bmap.contains(&Point::from_i64(Space::set(1), &[5])));
    }

    #[test]
    fn test_gist_drops_implied_constraints() {
        // self: 0 <= x <= 10, context: 0 <= x <= 3
        let context = interval(0, 3);
        let gisted = interval(0, 10).gist(&context).unwrap();
        // Both bounds of self are implied by the context.
        assert!(gisted.is_universe());
    }

    #[test]
    fn test_gist_keeps_binding_constraints() {
        // self: x <= 5 within context x >= 0
        let mut this = BasicMap::universe(Space::set(1));
        this.add_upper_bound(0, 5);
        let mut context = BasicMap::universe(Space::set(1));
        context.add_lower_bound(0, 0);
        let gisted = this.gist(&context).unwrap();
        assert_eq!(gisted.n_ineq(), 1);
    }
}
