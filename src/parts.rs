//! The generic per-space union container.
//!
//! A [`Union`] maps a space signature to exactly one part: inserting a
//! part for a space that already holds one merges the two through the
//! part type's additive [`Part::add`], and entries that become the
//! type's zero are removed eagerly. The container itself lives in a
//! parameters-only space; parts are aligned onto it as they enter.
//!
//! The part type supplies a small capability set ([`Part`]) instead of
//! the container being stamped out per concrete type.

use std::collections::HashMap;

use crate::error::Result;
use crate::map::Map;
use crate::point::Point;
use crate::set::Set;
use crate::space::{Space, SpaceKey};

/// The capability set a union container requires of its part type.
pub trait Part: Clone {
    /// The space this part lives in.
    fn get_space(&self) -> Space;

    /// The additive identity over `space`.
    fn zero(space: Space) -> Self;

    /// Whether this part is the additive identity.
    fn is_zero(&self) -> bool;

    /// Additive merge with another part over the same space.
    fn add(self, other: Self) -> Result<Self>;

    /// Re-express the part with its parameters aligned to `model`.
    fn align_params(self, model: &Space) -> Self;

    /// Per-part simplification; the identity by default.
    fn coalesce(self) -> Self {
        self
    }

    /// Structural equality of representations.
    fn plain_is_equal(&self, other: &Self) -> bool;
}

/// Point evaluation for parts that support it.
pub trait Evaluate: Part {
    /// The value produced at a point.
    type Value;

    /// Evaluate the part at a point of its space.
    fn eval(&self, point: &Point) -> Self::Value;

    /// The value outside every stored part.
    fn zero_value() -> Self::Value;
}

/// A container holding at most one part per distinct space signature.
#[derive(Debug, Clone)]
pub struct Union<P: Part> {
    space: Space,
    parts: HashMap<SpaceKey, P>,
}

/// A union container of sets.
pub type UnionSet = Union<Set>;

/// A union container of maps.
pub type UnionMap = Union<Map>;

impl<P: Part> Union<P> {
    /// An empty container in the parameter space of `space`.
    pub fn empty(space: Space) -> Self {
        Self {
            space: space.params_only(),
            parts: HashMap::new(),
        }
    }

    /// A container holding one part.
    pub fn from_part(part: P) -> Result<Self> {
        Self::empty(part.get_space()).add_part(part)
    }

    /// The container's parameters-only space.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Number of stored parts.
    pub fn n_part(&self) -> usize {
        self.parts.len()
    }

    /// Insert a part, merging with an existing part over the same
    /// space signature and dropping the entry when the merge comes out
    /// zero. Parameters are aligned first, growing the container's
    /// parameter space as needed.
    pub fn add_part(mut self, part: P) -> Result<Self> {
        if part.is_zero() {
            return Ok(self);
        }
        let part = if part.get_space().params_match(&self.space) {
            part
        } else {
            self = self.align_params(&part.get_space());
            part.align_params(&self.space)
        };
        let key = part.get_space().key();
        match self.parts.remove(&key) {
            None => {
                self.parts.insert(key, part);
            }
            Some(existing) => {
                let sum = existing.add(part)?;
                if !sum.is_zero() {
                    self.parts.insert(key, sum);
                }
            }
        }
        Ok(self)
    }

    /// The stored part for `space`, or the type's zero in that space.
    /// Never fails.
    pub fn extract_part(&self, space: &Space) -> P {
        match self.parts.get(&space.key()) {
            Some(part) => part.clone(),
            None => P::zero(space.clone()),
        }
    }

    /// Iterate over the stored parts in unspecified order.
    pub fn parts(&self) -> impl Iterator<Item = &P> {
        self.parts.values()
    }

    /// Call `f` once per stored part, on copies, in unspecified order.
    pub fn for_each_part<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(P) -> Result<()>,
    {
        for part in self.parts.values() {
            f(part.clone())?;
        }
        Ok(())
    }

    /// Align the container's parameters with a model space: a no-op on
    /// a match, otherwise every part is re-expressed under the combined
    /// parameter list in a fresh container.
    pub fn align_params(self, model: &Space) -> Self {
        if self.space.params_match(model) {
            return self;
        }
        let reorder = self.space.alignment_with(model);
        let space = Space::set(0).with_params(reorder.params().to_vec());
        let mut parts = HashMap::with_capacity(self.parts.len());
        for (key, part) in self.parts {
            parts.insert(key, part.align_params(&space));
        }
        Self { space, parts }
    }

    /// Add the parts of `other` into this container (union of
    /// supports): entries over the same space merge additively.
    pub fn add(self, other: Union<P>) -> Result<Self> {
        let this = self.align_params(other.space());
        let other = other.align_params(this.space());
        let mut this = this;
        for (_, part) in other.parts {
            this = this.add_part(part)?;
        }
        Ok(this)
    }

    /// Combine parts pairwise where both containers hold an entry for
    /// the same space; one-sided entries are dropped.
    pub fn match_bin<Q, F>(self, other: Union<Q>, mut combine: F) -> Result<Union<P>>
    where
        Q: Part,
        F: FnMut(P, Q) -> Result<P>,
    {
        let this = self.align_params(other.space());
        let other = other.align_params(this.space());
        let mut out = Union::empty(this.space.clone());
        for (key, part) in this.parts {
            let Some(other_part) = other.parts.get(&key) else {
                continue;
            };
            let combined = combine(part, other_part.clone())?;
            if !combined.is_zero() {
                out.parts.insert(key, combined);
            }
        }
        Ok(out)
    }

    /// Apply the per-part simplification to every stored part.
    pub fn coalesce(self) -> Self {
        let space = self.space;
        let parts = self
            .parts
            .into_iter()
            .map(|(key, part)| (key, part.coalesce()))
            .collect();
        Self { space, parts }
    }

    /// Structural equality of the stored representations: the same
    /// entry count and a structurally equal part per space.
    pub fn plain_is_equal(&self, other: &Union<P>) -> bool {
        self.parts.len() == other.parts.len()
            && self.parts.iter().all(|(key, part)| {
                other
                    .parts
                    .get(key)
                    .is_some_and(|o| part.plain_is_equal(o))
            })
    }
}

impl<P: Evaluate> Union<P> {
    /// Evaluate at a point: the stored part whose space matches the
    /// point's space decides, and the zero value applies elsewhere.
    pub fn eval(&self, point: &Point) -> P::Value {
        match self.parts.get(&point.space().key()) {
            Some(part) => part.eval(point),
            None => P::zero_value(),
        }
    }
}

impl Union<Set> {
    /// Pairwise intersection where both containers hold a set for the
    /// same space.
    pub fn intersect(self, other: Union<Set>) -> Result<Union<Set>> {
        self.match_bin(other, |a, b| a.intersect(b))
    }
}

impl Union<Map> {
    /// Restrict each map part to the matching domain set, where one
    /// exists; map parts with no matching domain entry are dropped.
    pub fn intersect_domain(self, dom: Union<Set>) -> Result<Union<Map>> {
        let this = self.align_params(dom.space());
        let dom = dom.align_params(this.space());
        let mut out = Union::empty(this.space.clone());
        for (key, map) in this.parts {
            let dom_key = map.space().domain().key();
            let Some(set) = dom.parts.get(&dom_key) else {
                continue;
            };
            let restricted = map.intersect_domain(set.clone())?;
            if !Part::is_zero(&restricted) {
                out.parts.insert(key, restricted);
            }
        }
        Ok(out)
    }

    /// Gist each map part with respect to the matching domain set; map
    /// parts with no matching domain entry are dropped.
    pub fn gist(self, context: Union<Set>) -> Result<Union<Map>> {
        let this = self.align_params(context.space());
        let context = context.align_params(this.space());
        let mut out = Union::empty(this.space.clone());
        for (key, map) in this.parts {
            let dom_key = map.space().domain().key();
            let Some(set) = context.parts.get(&dom_key) else {
                continue;
            };
            let ctx = Map::universe(map.space().clone()).intersect_domain(set.clone())?;
            let gisted = map.gist(&ctx)?;
            if !Part::is_zero(&gisted) {
                out.parts.insert(key, gisted);
            }
        }
        Ok(out)
    }
}

impl Part for Set {
    fn get_space(&self) -> Space {
        self.space().clone()
    }

    fn zero(space: Space) -> Self {
        Set::empty(space)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn add(self, other: Self) -> Result<Self> {
        Ok(self.union(other)?.coalesce())
    }

    fn align_params(self, model: &Space) -> Self {
        Set::align_params(self, model)
    }

    fn coalesce(self) -> Self {
        Set::coalesce(self)
    }

    fn plain_is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl Evaluate for Set {
    type Value = bool;

    fn eval(&self, point: &Point) -> bool {
        self.contains(point)
    }

    fn zero_value() -> bool {
        false
    }
}

impl Part for Map {
    fn get_space(&self) -> Space {
        Map::space(self).clone()
    }

    fn zero(space: Space) -> Self {
        Map::empty(space)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn add(self, other: Self) -> Result<Self> {
        Ok(self.union(other)?.coalesce())
    }

    fn align_params(self, model: &Space) -> Self {
        Map::align_params(self, model)
    }

    fn coalesce(self) -> Self {
        Map::coalesce(self)
    }

    fn plain_is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl Evaluate for Map {
    type Value = bool;

    fn eval(&self, point: &Point) -> bool {
        self.contains(point)
    }

    fn zero_value() -> bool {
        false
    }
}
