//! Constraint rows and exact integer sequence operations.
//!
//! A constraint row is a fixed-width sequence of arbitrary-precision
//! integers `[constant, coefficients...]`. An equality row states
//! `row · (1, x) == 0`, an inequality row states `row · (1, x) >= 0`.
//! This module provides the shared row arithmetic: dot products, sign
//! flips, gcd normalization with integer tightening, and exact
//! elimination of a variable using an equality.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

/// The exact integer type used for all coefficients.
pub type Int = BigInt;

/// A zero-initialized row of the given width.
pub fn zero_row(width: usize) -> Vec<Int> {
    vec![Int::zero(); width]
}

/// Build a row from machine integers, for constructors and tests.
pub fn row_from_i64(values: &[i64]) -> Vec<Int> {
    values.iter().map(|&v| Int::from(v)).collect()
}

/// Evaluate `row · (1, values)`.
///
/// `values` must supply one entry per coefficient column.
pub fn dot(row: &[Int], values: &[Int]) -> Int {
    debug_assert_eq!(row.len(), 1 + values.len());
    let mut acc = row[0].clone();
    for (c, v) in row[1..].iter().zip(values) {
        acc += c * v;
    }
    acc
}

/// Negate every entry of the row in place.
pub fn negate(row: &mut [Int]) {
    for c in row.iter_mut() {
        *c = -std::mem::take(c);
    }
}

/// A negated copy of the row.
pub fn negated(row: &[Int]) -> Vec<Int> {
    row.iter().map(|c| -c).collect()
}

/// The negation of an inequality `row >= 0` over the integers:
/// `-row - 1 >= 0`.
pub fn opposite_ineq(row: &[Int]) -> Vec<Int> {
    let mut out = negated(row);
    out[0] -= 1;
    out
}

/// True when all coefficient columns (everything after the constant) are
/// zero.
pub fn is_constant_row(row: &[Int]) -> bool {
    row[1..].iter().all(Zero::is_zero)
}

/// Gcd of the coefficient columns, zero for a constant row.
pub fn coeff_gcd(row: &[Int]) -> Int {
    let mut g = Int::zero();
    for c in &row[1..] {
        g = g.gcd(c);
    }
    g
}

/// Floor division rounding toward negative infinity.
pub fn floor_div(a: &Int, b: &Int) -> Int {
    a.div_floor(b)
}

/// Normalize an inequality row by the gcd `g` of its coefficients,
/// tightening the constant with a floor division.
///
/// Exact over the integers: `g*y + c >= 0` holds for integer `y` iff
/// `y + floor(c/g) >= 0`.
pub fn tighten_ineq(row: &mut [Int]) {
    let g = coeff_gcd(row);
    if g.is_zero() || g == Int::from(1) {
        return;
    }
    row[0] = row[0].div_floor(&g);
    for c in row[1..].iter_mut() {
        *c = std::mem::take(c) / &g;
    }
}

/// Normalize an equality row by the gcd of its coefficients.
///
/// Returns `false` when the row is unsatisfiable over the integers
/// (a constant row with nonzero constant, or a constant not divisible
/// by the coefficient gcd).
pub fn normalize_eq(row: &mut [Int]) -> bool {
    let g = coeff_gcd(row);
    if g.is_zero() {
        return row[0].is_zero();
    }
    if !(&row[0] % &g).is_zero() {
        return false;
    }
    if g != Int::from(1) {
        for c in row.iter_mut() {
            *c = std::mem::take(c) / &g;
        }
    }
    true
}

/// Eliminate column `col` from `target` using the equality row `eq`
/// (which must have a nonzero entry at `col`).
///
/// The target is scaled by a positive factor only, so an inequality row
/// keeps its direction; a multiple of the equality is then added.
pub fn eliminate(target: &mut Vec<Int>, eq: &[Int], col: usize) {
    debug_assert_eq!(target.len(), eq.len());
    debug_assert!(!eq[col].is_zero());
    if target[col].is_zero() {
        return;
    }
    let g = eq[col].gcd(&target[col]);
    let scale = eq[col].abs() / &g;
    let mult = (&target[col] / &g) * eq[col].signum();
    for (t, e) in target.iter_mut().zip(eq) {
        *t = &*t * &scale - &mult * e;
    }
    debug_assert!(target[col].is_zero());
}

/// Divide the whole row (constant included) by the gcd of all entries.
///
/// Valid for rational-level reasoning only; used to keep intermediate
/// elimination rows small.
pub fn reduce_rational(row: &mut [Int]) {
    let mut g = Int::zero();
    for c in row.iter() {
        g = g.gcd(c);
    }
    if g.is_zero() || g == Int::from(1) {
        return;
    }
    for c in row.iter_mut() {
        *c = std::mem::take(c) / &g;
    }
}

/// Map a row expressed in one division numbering into another.
///
/// The prefix `1 + dim` (constant plus non-division columns) is copied
/// as is; the coefficient of source division `i` lands in column
/// `1 + dim + div_map[i]` of the output, which has `width` columns.
pub fn expand_row(row: &[Int], dim: usize, div_map: &[usize], width: usize) -> Vec<Int> {
    let mut out = zero_row(width);
    out[..1 + dim].clone_from_slice(&row[..1 + dim]);
    for (i, &col) in div_map.iter().enumerate() {
        out[1 + dim + col] = row[1 + dim + i].clone();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(values: &[i64]) -> Vec<Int> {
        row_from_i64(values)
    }

    #[test]
    fn test_dot() {
        // 3 + 2x - y at (4, 5)
        let row = r(&[3, 2, -1]);
        let vals = r(&[4, 5]);
        assert_eq!(dot(&row, &vals[..]), Int::from(6));
    }

    #[test]
    fn test_opposite_ineq() {
        // x - 3 >= 0 negated is 2 - x >= 0 (x <= 2)
        let row = r(&[-3, 1]);
        assert_eq!(opposite_ineq(&row), r(&[2, -1]));
    }

    #[test]
    fn test_tighten() {
        // 2x + 3 >= 0 tightens to x + 1 >= 0
        let mut row = r(&[3, 2]);
        tighten_ineq(&mut row);
        assert_eq!(row, r(&[1, 1]));
    }

    #[test]
    fn test_normalize_eq_divisibility() {
        // 2x + 1 = 0 has no integer solution
        let mut row = r(&[1, 2]);
        assert!(!normalize_eq(&mut row));
        // 2x + 4 = 0 becomes x + 2 = 0
        let mut row = r(&[4, 2]);
        assert!(normalize_eq(&mut row));
        assert_eq!(row, r(&[2, 1]));
    }

    #[test]
    fn test_eliminate_keeps_direction() {
        // eq: x - 5 = 0; target: 10 - 2x >= 0 becomes 0 >= 0
        let eq = r(&[-5, 1, 0]);
        let mut target = r(&[10, -2, 0]);
        eliminate(&mut target, &eq, 1);
        assert!(target[1].is_zero());
        assert_eq!(target[0], Int::from(0));
    }

    #[test]
    fn test_expand_row() {
        // one dim, two source divs mapped to columns 2 and 0
        let row = r(&[7, 1, 3, 4]);
        let out = expand_row(&row, 1, &[2, 0], 5);
        assert_eq!(out, r(&[7, 1, 4, 0, 3]));
    }
}
