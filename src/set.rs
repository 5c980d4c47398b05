//! Sets as maps with no input dimensions.
//!
//! [`BasicSet`] and [`Set`] are thin wrappers over [`BasicMap`] and
//! [`Map`] that fix the space to a set space and index constraints by
//! set dimension instead of raw column.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::basic::BasicMap;
use crate::error::Result;
use crate::map::Map;
use crate::point::Point;
use crate::space::Space;
use crate::vector::Int;

/// A single conjunction of constraints over a set space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicSet {
    bmap: BasicMap,
}

impl BasicSet {
    /// The unconstrained basic set.
    pub fn universe(space: Space) -> Self {
        assert!(space.is_set());
        Self {
            bmap: BasicMap::universe(space),
        }
    }

    /// The canonical empty basic set.
    pub fn empty(space: Space) -> Self {
        assert!(space.is_set());
        Self {
            bmap: BasicMap::empty(space),
        }
    }

    /// Wrap a basic map over a set space.
    pub fn from_basic_map(bmap: BasicMap) -> Self {
        assert!(bmap.space().is_set());
        Self { bmap }
    }

    /// The underlying basic map.
    pub fn as_basic_map(&self) -> &BasicMap {
        &self.bmap
    }

    /// Unwrap into the underlying basic map.
    pub fn into_basic_map(self) -> BasicMap {
        self.bmap
    }

    /// The space of this basic set.
    pub fn space(&self) -> &Space {
        self.bmap.space()
    }

    /// Constrain set dimension `dim` to be at least `bound`.
    pub fn add_lower_bound(&mut self, dim: usize, bound: i64) {
        let var = self.bmap.space().n_param() + dim;
        self.bmap.add_lower_bound(var, bound);
    }

    /// Constrain set dimension `dim` to be at most `bound`.
    pub fn add_upper_bound(&mut self, dim: usize, bound: i64) {
        let var = self.bmap.space().n_param() + dim;
        self.bmap.add_upper_bound(var, bound);
    }

    /// Constrain set dimension `dim` to equal `value`.
    pub fn fix(&mut self, dim: usize, value: i64) {
        let var = self.bmap.space().n_param() + dim;
        self.bmap.fix(var, value);
    }

    /// Add a raw equality row.
    pub fn add_eq(&mut self, row: Vec<Int>) {
        self.bmap.add_eq(row);
    }

    /// Add a raw inequality row.
    pub fn add_ineq(&mut self, row: Vec<Int>) {
        self.bmap.add_ineq(row);
    }

    /// Whether the point lies in the set.
    pub fn contains(&self, point: &Point) -> bool {
        self.bmap.contains(point)
    }

    /// Whether the set has no integer points.
    pub fn is_empty(&self) -> bool {
        self.bmap.is_empty()
    }

    /// Simplify in place.
    pub fn simplify(&mut self) {
        self.bmap.simplify();
    }
}

impl fmt::Display for BasicSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bmap.fmt(f)
    }
}

/// A union of basic sets over one set space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    map: Map,
}

impl Set {
    /// The empty set.
    pub fn empty(space: Space) -> Self {
        assert!(space.is_set());
        Self {
            map: Map::empty(space),
        }
    }

    /// The unconstrained set.
    pub fn universe(space: Space) -> Self {
        assert!(space.is_set());
        Self {
            map: Map::universe(space),
        }
    }

    /// A set holding one basic piece.
    pub fn from_basic(bset: BasicSet) -> Self {
        Self {
            map: Map::from_basic(bset.into_basic_map()),
        }
    }

    /// Wrap a map over a set space.
    pub fn from_map(map: Map) -> Self {
        assert!(map.space().is_set());
        Self { map }
    }

    /// The underlying map.
    pub fn as_map(&self) -> &Map {
        &self.map
    }

    /// Unwrap into the underlying map.
    pub fn into_map(self) -> Map {
        self.map
    }

    /// The space of this set.
    pub fn space(&self) -> &Space {
        self.map.space()
    }

    /// The pieces in order.
    pub fn pieces(&self) -> &[BasicMap] {
        self.map.pieces()
    }

    /// Number of pieces.
    pub fn n_piece(&self) -> usize {
        self.map.n_piece()
    }

    /// Whether the pieces are known pairwise disjoint.
    pub fn known_disjoint(&self) -> bool {
        self.map.known_disjoint()
    }

    /// Append one basic piece.
    pub fn add_basic(&mut self, bset: BasicSet) -> Result<()> {
        self.map.add_basic(bset.into_basic_map())
    }

    /// Union of two sets whose pieces may overlap.
    pub fn union(self, other: Set) -> Result<Set> {
        Ok(Set {
            map: self.map.union(other.map)?,
        })
    }

    /// Union of two sets known to be disjoint from each other.
    pub fn union_disjoint(self, other: Set) -> Result<Set> {
        Ok(Set {
            map: self.map.union_disjoint(other.map)?,
        })
    }

    /// The set difference `self \ other`.
    pub fn subtract(self, other: Set) -> Result<Set> {
        Ok(Set {
            map: self.map.subtract(other.map)?,
        })
    }

    /// Intersection of two sets.
    pub fn intersect(self, other: Set) -> Result<Set> {
        Ok(Set {
            map: self.map.intersect(other.map)?,
        })
    }

    /// Whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Set) -> Result<bool> {
        self.map.is_subset(&other.map)
    }

    /// Whether both sets contain the same integer points.
    pub fn is_equal(&self, other: &Set) -> Result<bool> {
        self.map.is_equal(&other.map)
    }

    /// Whether the set has no integer points.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rewrite the set with pairwise disjoint pieces.
    pub fn make_disjoint(self) -> Result<Set> {
        Ok(Set {
            map: self.map.make_disjoint()?,
        })
    }

    /// The complement within the set's universe.
    pub fn complement(self) -> Result<Set> {
        Ok(Set {
            map: self.map.complement()?,
        })
    }

    /// Drop constraints implied everywhere inside `context`.
    pub fn gist(self, context: &Set) -> Result<Set> {
        Ok(Set {
            map: self.map.gist(&context.map)?,
        })
    }

    /// Simplify pieces, drop empty ones, and merge duplicates.
    pub fn coalesce(self) -> Set {
        Set {
            map: self.map.coalesce(),
        }
    }

    /// Whether the point lies in the set.
    pub fn contains(&self, point: &Point) -> bool {
        self.map.contains(point)
    }

    /// Align this set's parameters with a model space.
    pub fn align_params(self, model: &Space) -> Set {
        Set {
            map: self.map.align_params(model),
        }
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.map.fmt(f)
    }
}

impl From<BasicSet> for Set {
    fn from(bset: BasicSet) -> Set {
        Set::from_basic(bset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(lo: i64, hi: i64) -> Set {
        let mut bset = BasicSet::universe(Space::set(1));
        bset.add_lower_bound(0, lo);
        bset.add_upper_bound(0, hi);
        Set::from_basic(bset)
    }

    #[test]
    fn test_interval_membership() {
        let s = interval(3, 7);
        assert!(s.contains(&Point::from_i64(Space::set(1), &[3])));
        assert!(!s.contains(&Point::from_i64(Space::set(1), &[8])));
    }

    #[test]
    fn test_set_algebra_roundtrip() {
        let a = interval(0, 10);
        let b = interval(5, 15);
        let both = a.clone().intersect(b).unwrap();
        assert!(both.is_equal(&interval(5, 10)).unwrap());
        assert!(both.is_subset(&a).unwrap());
    }

    #[test]
    fn test_coalesce_merges_duplicates() {
        let a = interval(0, 5);
        let doubled = a.clone().union(a.clone()).unwrap();
        assert_eq!(doubled.n_piece(), 2);
        let merged = doubled.coalesce();
        assert_eq!(merged.n_piece(), 1);
        assert!(merged.is_equal(&a).unwrap());
    }
}
