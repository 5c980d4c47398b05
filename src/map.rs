//! Disjunctive maps: ordered unions of basic maps.
//!
//! A [`Map`] is a list of [`BasicMap`] pieces over one space, together
//! with a flag recording whether the pieces are known pairwise
//! disjoint. The difference-based operations (`subtract`, `is_subset`,
//! `make_disjoint`, `complement`) are built on the backtracking engine
//! in [`crate::diff`].

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::basic::BasicMap;
use crate::diff::{basic_diff_is_empty, basic_map_subtract, collect_diff, Walk};
use crate::error::{PolysetError, Result};
use crate::point::Point;
use crate::set::Set;
use crate::space::{Reordering, Space};

/// A union of basic maps over one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    space: Space,
    pieces: Vec<BasicMap>,
    /// Whether the pieces are known to be pairwise disjoint.
    disjoint: bool,
}

impl Map {
    /// The empty map over `space`.
    pub fn empty(space: Space) -> Self {
        Self {
            space,
            pieces: Vec::new(),
            disjoint: true,
        }
    }

    /// The unconstrained map over `space`.
    pub fn universe(space: Space) -> Self {
        let piece = BasicMap::universe(space.clone());
        Self {
            space,
            pieces: vec![piece],
            disjoint: true,
        }
    }

    /// A map holding a single basic piece.
    pub fn from_basic(bmap: BasicMap) -> Self {
        Self {
            space: bmap.space().clone(),
            pieces: vec![bmap],
            disjoint: true,
        }
    }

    /// The space of this map.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// The pieces in order.
    pub fn pieces(&self) -> &[BasicMap] {
        &self.pieces
    }

    /// Number of pieces.
    pub fn n_piece(&self) -> usize {
        self.pieces.len()
    }

    /// Whether the pieces are known pairwise disjoint.
    pub fn known_disjoint(&self) -> bool {
        self.disjoint
    }

    /// Append one piece. The disjointness of the result is unknown
    /// unless it is the only piece.
    pub fn add_basic(&mut self, bmap: BasicMap) -> Result<()> {
        if bmap.space() != &self.space {
            return Err(PolysetError::space_mismatch(&self.space, bmap.space()));
        }
        self.pieces.push(bmap);
        if self.pieces.len() > 1 {
            self.disjoint = false;
        }
        Ok(())
    }

    /// Union of two maps whose pieces may overlap.
    pub fn union(self, other: Map) -> Result<Map> {
        self.union_impl(other, false)
    }

    /// Union of two maps the caller knows to be disjoint from each
    /// other; keeps the disjointness flag when both sides carry it.
    pub fn union_disjoint(self, other: Map) -> Result<Map> {
        self.union_impl(other, true)
    }

    fn union_impl(self, other: Map, pairwise_disjoint: bool) -> Result<Map> {
        let (mut left, mut right) = aligned_pair(self, other)?;
        if left.pieces.is_empty() {
            return Ok(right);
        }
        if right.pieces.is_empty() {
            return Ok(left);
        }
        let disjoint = pairwise_disjoint && left.disjoint && right.disjoint;
        left.pieces.append(&mut right.pieces);
        left.disjoint = disjoint;
        Ok(left)
    }

    /// True when every piece is empty.
    pub fn is_empty(&self) -> bool {
        self.pieces.iter().all(|p| p.is_empty())
    }

    /// True when some piece is the unconstrained universe.
    pub fn plain_is_universe(&self) -> bool {
        self.pieces.iter().any(|p| p.is_universe())
    }

    /// True when the map consists of exactly one single-point piece.
    pub fn plain_is_singleton(&self) -> bool {
        self.pieces.len() == 1 && self.pieces[0].plain_is_singleton()
    }

    /// Whether the map contains a point.
    pub fn contains(&self, point: &Point) -> bool {
        self.pieces.iter().any(|p| p.contains(point))
    }

    /// Simplify every piece and drop the trivially empty ones.
    fn normalized(mut self) -> Self {
        for piece in &mut self.pieces {
            piece.simplify();
        }
        self.pieces.retain(|p| !p.is_plain_empty());
        self
    }

    /// Simplify pieces, drop empty ones, and merge structurally equal
    /// duplicates.
    pub fn coalesce(self) -> Self {
        let mut map = self.normalized();
        let mut kept: Vec<BasicMap> = Vec::with_capacity(map.pieces.len());
        for piece in map.pieces.drain(..) {
            if !kept.contains(&piece) {
                kept.push(piece);
            }
        }
        map.pieces = kept;
        map
    }

    /// The set difference `self \ other`.
    ///
    /// `(U_i A_i) \ (U_j B_j)` is computed as `U_i (A_i \ (U_j B_j))`,
    /// one run of the difference engine per left-hand piece.
    pub fn subtract(self, other: Map) -> Result<Map> {
        let (map1, map2) = aligned_pair(self, other)?;
        if map2.is_empty() {
            return Ok(map1);
        }
        let map1_disjoint = map1.disjoint;
        let map1 = map1.normalized();
        let map2 = map2.normalized();
        debug!(
            "subtract: {} pieces minus {} pieces",
            map1.n_piece(),
            map2.n_piece()
        );
        let mut diff = Map::empty(map1.space.clone());
        for piece in &map1.pieces {
            let mut parts = Map::empty(map1.space.clone());
            for part in basic_map_subtract(piece, &map2.pieces)? {
                parts.pieces.push(part);
            }
            diff = if map1_disjoint {
                diff.union_disjoint(parts)?
            } else {
                diff.union(parts)?
            };
        }
        Ok(diff)
    }

    /// Whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Map) -> Result<bool> {
        let (map1, map2) = aligned_params(self.clone(), other.clone());
        if !map1.space.key_matches(&map2.space) {
            return Ok(false);
        }
        if map1.is_empty() {
            return Ok(true);
        }
        if map2.is_empty() {
            return Ok(false);
        }
        if map2.plain_is_universe() {
            return Ok(true);
        }
        let map1 = map1.normalized();
        if map1.plain_is_singleton() {
            // A single point: test direct containment instead of
            // running the difference engine.
            if let Some(point) = map1.pieces[0].singleton_point() {
                return Ok(map2.contains(&point));
            }
        }
        for piece in &map1.pieces {
            if !basic_diff_is_empty(piece, &map2.pieces)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether both maps contain the same integer points.
    pub fn is_equal(&self, other: &Map) -> Result<bool> {
        Ok(self.is_subset(other)? && other.is_subset(self)?)
    }

    /// Rewrite the map so its pieces are pairwise disjoint, preserving
    /// the union of points. Pieces are folded one at a time, each new
    /// piece first having the accumulated result subtracted from it.
    pub fn make_disjoint(self) -> Result<Map> {
        if self.disjoint || self.pieces.len() <= 1 {
            let mut map = self;
            map.disjoint = true;
            return Ok(map);
        }
        let map = self.normalized();
        if map.pieces.len() <= 1 {
            let mut map = map;
            map.disjoint = true;
            return Ok(map);
        }
        let mut acc = Map::from_basic(map.pieces[0].clone());
        for piece in &map.pieces[1..] {
            let sofar = acc.pieces.clone();
            collect_diff(piece, &sofar, &mut |part| {
                acc.pieces.push(part);
                Ok(Walk::Continue)
            })?;
        }
        acc.disjoint = true;
        Ok(acc)
    }

    /// The complement within the map's universe.
    pub fn complement(self) -> Result<Map> {
        Map::universe(self.space.clone()).subtract(self)
    }

    /// Intersection, combining every pair of pieces.
    pub fn intersect(self, other: Map) -> Result<Map> {
        let (map1, map2) = aligned_pair(self, other)?;
        let mut out = Map::empty(map1.space.clone());
        out.disjoint = map1.disjoint && map2.disjoint;
        for a in &map1.pieces {
            for b in &map2.pieces {
                out.pieces.push(a.clone().intersect(b)?);
            }
        }
        Ok(out)
    }

    /// Restrict the inputs of the map to `dom`.
    pub fn intersect_domain(self, dom: Set) -> Result<Map> {
        let (map, dom) = aligned_params(self, dom.into_map());
        if !map.space.domain().key_matches(dom.space()) {
            return Err(PolysetError::space_mismatch(&map.space, dom.space()));
        }
        let mut out = Map::empty(map.space.clone());
        out.disjoint = map.disjoint && dom.disjoint;
        for piece in &map.pieces {
            for dom_piece in &dom.pieces {
                let embedded = BasicMap::from_domain_set(dom_piece, &map.space);
                out.pieces.push(piece.clone().intersect(&embedded)?);
            }
        }
        Ok(out)
    }

    /// Restrict the outputs of the map to `ran`.
    pub fn intersect_range(self, ran: Set) -> Result<Map> {
        let (map, ran) = aligned_params(self, ran.into_map());
        if !map.space.range().key_matches(ran.space()) {
            return Err(PolysetError::space_mismatch(&map.space, ran.space()));
        }
        let mut out = Map::empty(map.space.clone());
        out.disjoint = map.disjoint && ran.disjoint;
        for piece in &map.pieces {
            for ran_piece in &ran.pieces {
                let embedded = BasicMap::from_range_set(ran_piece, &map.space);
                out.pieces.push(piece.clone().intersect(&embedded)?);
            }
        }
        Ok(out)
    }

    /// Remove from the map every pair whose input lies in `dom`.
    pub fn subtract_domain(self, dom: Set) -> Result<Map> {
        let ext = Map::universe(self.space.clone()).intersect_domain(dom)?;
        self.subtract(ext)
    }

    /// Remove from the map every pair whose output lies in `ran`.
    pub fn subtract_range(self, ran: Set) -> Result<Map> {
        let ext = Map::universe(self.space.clone()).intersect_range(ran)?;
        self.subtract(ext)
    }

    /// Drop constraints that are implied everywhere inside `context`.
    /// A constraint of a piece is removed only when every piece of the
    /// context implies it, so the result equals `self` within
    /// `context`. Gist with respect to an empty context is the
    /// universe.
    pub fn gist(self, context: &Map) -> Result<Map> {
        let (map, context) = aligned_pair(self, context.clone())?;
        if context.pieces.is_empty() {
            return Ok(Map::universe(map.space.clone()));
        }
        let mut out = Map::empty(map.space.clone());
        out.disjoint = map.disjoint;
        for piece in &map.pieces {
            let mut kept: Option<BasicMap> = None;
            for ctx in &context.pieces {
                let gisted = piece.clone().gist(ctx)?;
                kept = Some(match kept {
                    None => gisted,
                    Some(prev) => merge_kept_rows(piece, prev, gisted),
                });
            }
            let piece = kept.expect("context has pieces");
            if !piece.is_plain_empty() {
                out.pieces.push(piece);
            }
        }
        Ok(out)
    }

    /// Re-express the map under an aligned parameter numbering.
    pub fn realign(&self, reorder: &Reordering) -> Map {
        Map {
            space: self.space.realign(reorder),
            pieces: self.pieces.iter().map(|p| p.realign(reorder)).collect(),
            disjoint: self.disjoint,
        }
    }

    /// Align this map's parameters with a model space.
    pub fn align_params(self, model: &Space) -> Map {
        if self.space.params_match(model) {
            return self;
        }
        let reorder = self.space.alignment_with(model);
        self.realign(&reorder)
    }
}

/// Align the parameters of both maps with each other (left onto right,
/// then right onto the combined list).
fn aligned_params(left: Map, right: Map) -> (Map, Map) {
    if left.space.params_match(&right.space) {
        return (left, right);
    }
    let left = left.align_params(&right.space);
    let right = right.align_params(&left.space);
    (left, right)
}

/// Like [`aligned_params`], but a non-parameter mismatch is an error.
fn aligned_pair(left: Map, right: Map) -> Result<(Map, Map)> {
    let (left, right) = aligned_params(left, right);
    if !left.space.key_matches(&right.space) {
        return Err(PolysetError::space_mismatch(&left.space, &right.space));
    }
    Ok((left, right))
}

/// Keep a row of `piece` when either gist result kept it: a row may be
/// dropped only if every context piece implied it.
fn merge_kept_rows(piece: &BasicMap, a: BasicMap, b: BasicMap) -> BasicMap {
    let keep_eq: Vec<_> = piece
        .eqs()
        .iter()
        .filter(|row| a.eqs().contains(row) || b.eqs().contains(row))
        .cloned()
        .collect();
    let keep_ineq: Vec<_> = piece
        .ineqs()
        .iter()
        .filter(|row| a.ineqs().contains(row) || b.ineqs().contains(row))
        .cloned()
        .collect();
    BasicMap::from_parts(piece.space().clone(), piece.divs().to_vec(), keep_eq, keep_ineq)
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pieces.is_empty() {
            return write!(f, "{{ false }}");
        }
        for (i, piece) in self.pieces.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            write!(f, "{}", piece)?;
        }
        Ok(())
    }
}
