//! Spaces describe the dimension signature of sets and maps.
//!
//! A space carries named parameter dimensions (symbolic constants),
//! counted input and output dimensions, and optional tuple names that
//! give spaces identity. Sets are maps with no input dimensions.
//!
//! Two spaces are compatible for a binary operation only when their
//! parameter lists agree; [`Space::alignment_with`] builds the
//! reordering that makes them agree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vector::{zero_row, Int};

/// The dimension signature of a set or map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Named parameter dimensions, identified across spaces by name.
    params: Vec<String>,
    /// Number of input dimensions (zero for a set space).
    n_in: usize,
    /// Number of output dimensions (the set dimensions for a set space).
    n_out: usize,
    /// Optional input tuple name.
    in_tuple: Option<String>,
    /// Optional output tuple name.
    out_tuple: Option<String>,
}

/// The hashable identity of a space with parameters stripped, used to
/// key the union container: at most one part per distinct signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceKey {
    in_tuple: Option<String>,
    out_tuple: Option<String>,
    n_in: usize,
    n_out: usize,
}

impl Space {
    /// A set space with `n_dim` dimensions and no parameters.
    pub fn set(n_dim: usize) -> Self {
        Self {
            params: Vec::new(),
            n_in: 0,
            n_out: n_dim,
            in_tuple: None,
            out_tuple: None,
        }
    }

    /// A named set space.
    pub fn set_named(name: impl Into<String>, n_dim: usize) -> Self {
        let mut space = Self::set(n_dim);
        space.out_tuple = Some(name.into());
        space
    }

    /// A map space with `n_in` input and `n_out` output dimensions.
    pub fn map(n_in: usize, n_out: usize) -> Self {
        Self {
            params: Vec::new(),
            n_in,
            n_out,
            in_tuple: None,
            out_tuple: None,
        }
    }

    /// A named map space.
    pub fn map_named(
        in_name: impl Into<String>,
        n_in: usize,
        out_name: impl Into<String>,
        n_out: usize,
    ) -> Self {
        let mut space = Self::map(n_in, n_out);
        space.in_tuple = Some(in_name.into());
        space.out_tuple = Some(out_name.into());
        space
    }

    /// Attach parameter names, replacing any existing ones.
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// Check if this is a set space (no input dimensions or tuple).
    pub fn is_set(&self) -> bool {
        self.n_in == 0 && self.in_tuple.is_none()
    }

    /// Number of parameter dimensions.
    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    /// Number of input dimensions.
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Number of output dimensions.
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Parameter names in order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Total dimension count, divisions excluded.
    pub fn dim_total(&self) -> usize {
        self.params.len() + self.n_in + self.n_out
    }

    /// The same space with input/output dimensions and tuples dropped,
    /// keeping only the parameters. Union containers live in such a
    /// space.
    pub fn params_only(&self) -> Space {
        Space {
            params: self.params.clone(),
            n_in: 0,
            n_out: 0,
            in_tuple: None,
            out_tuple: None,
        }
    }

    /// The set space of this map's inputs.
    pub fn domain(&self) -> Space {
        Space {
            params: self.params.clone(),
            n_in: 0,
            n_out: self.n_in,
            in_tuple: None,
            out_tuple: self.in_tuple.clone(),
        }
    }

    /// The set space of this map's outputs.
    pub fn range(&self) -> Space {
        Space {
            params: self.params.clone(),
            n_in: 0,
            n_out: self.n_out,
            in_tuple: None,
            out_tuple: self.out_tuple.clone(),
        }
    }

    /// The non-parameter identity of this space.
    pub fn key(&self) -> SpaceKey {
        SpaceKey {
            in_tuple: self.in_tuple.clone(),
            out_tuple: self.out_tuple.clone(),
            n_in: self.n_in,
            n_out: self.n_out,
        }
    }

    /// True when both spaces have the same parameter list.
    pub fn params_match(&self, other: &Space) -> bool {
        self.params == other.params
    }

    /// True when the spaces agree on everything but parameters.
    pub fn key_matches(&self, other: &Space) -> bool {
        self.n_in == other.n_in
            && self.n_out == other.n_out
            && self.in_tuple == other.in_tuple
            && self.out_tuple == other.out_tuple
    }

    /// Build the reordering that aligns this space's parameters with
    /// `model`'s: the result's parameter list is the model's, extended
    /// with this space's extra parameters in order of appearance.
    pub fn alignment_with(&self, model: &Space) -> Reordering {
        let mut params = model.params.clone();
        let mut map = Vec::with_capacity(self.params.len());
        for name in &self.params {
            match params.iter().position(|p| p == name) {
                Some(pos) => map.push(pos),
                None => {
                    map.push(params.len());
                    params.push(name.clone());
                }
            }
        }
        Reordering { params, map }
    }

    /// Apply a reordering to this space, replacing its parameter list.
    pub fn realign(&self, reorder: &Reordering) -> Space {
        debug_assert_eq!(self.params.len(), reorder.map.len());
        Space {
            params: reorder.params.clone(),
            n_in: self.n_in,
            n_out: self.n_out,
            in_tuple: self.in_tuple.clone(),
            out_tuple: self.out_tuple.clone(),
        }
    }
}

/// A parameter reordering produced by [`Space::alignment_with`]:
/// position `i` of the old parameter list moves to position `map[i]`
/// of the combined list `params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordering {
    params: Vec<String>,
    map: Vec<usize>,
}

impl Reordering {
    /// Parameter names of the aligned space.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// True when the reordering is the identity on an unchanged list.
    pub fn is_identity(&self) -> bool {
        self.params.len() == self.map.len() && self.map.iter().enumerate().all(|(i, &j)| i == j)
    }

    /// Re-express a constraint row under the aligned parameter
    /// numbering. `old_n_param` columns after the constant are
    /// parameter coefficients; the remaining `n_rest` columns (inputs,
    /// outputs, divisions) are shifted.
    pub fn apply_to_row(&self, row: &[Int], old_n_param: usize, n_rest: usize) -> Vec<Int> {
        debug_assert_eq!(row.len(), 1 + old_n_param + n_rest);
        debug_assert_eq!(old_n_param, self.map.len());
        let mut out = zero_row(1 + self.params.len() + n_rest);
        out[0] = row[0].clone();
        for (i, &pos) in self.map.iter().enumerate() {
            out[1 + pos] = row[1 + i].clone();
        }
        let src = 1 + old_n_param;
        let dst = 1 + self.params.len();
        out[dst..dst + n_rest].clone_from_slice(&row[src..src + n_rest]);
        out
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        let tuple = |name: &Option<String>, n: usize| match name {
            Some(name) => format!("{}[{}]", name, n),
            None => format!("[{}]", n),
        };
        if self.is_set() {
            write!(f, "{{ {} }}", tuple(&self.out_tuple, self.n_out))
        } else {
            write!(
                f,
                "{{ {} -> {} }}",
                tuple(&self.in_tuple, self.n_in),
                tuple(&self.out_tuple, self.n_out)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::row_from_i64;

    #[test]
    fn test_set_space() {
        let space = Space::set(3);
        assert!(space.is_set());
        assert_eq!(space.n_out(), 3);
        assert_eq!(space.dim_total(), 3);
    }

    #[test]
    fn test_key_ignores_params() {
        let a = Space::set_named("S", 2).with_params(vec!["n".into()]);
        let b = Space::set_named("S", 2);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Space::set_named("T", 2).key());
    }

    #[test]
    fn test_alignment_extends_and_reorders() {
        let model = Space::set(1).with_params(vec!["m".into(), "n".into()]);
        let space = Space::set(1).with_params(vec!["n".into(), "k".into()]);
        let reorder = space.alignment_with(&model);
        assert_eq!(reorder.params(), &["m", "n", "k"]);

        // n + 2k + x + 3 under the old numbering
        let row = row_from_i64(&[3, 1, 2, 1]);
        let aligned = reorder.apply_to_row(&row, 2, 1);
        assert_eq!(aligned, row_from_i64(&[3, 0, 1, 2, 1]));
    }

    #[test]
    fn test_identity_alignment() {
        let model = Space::set(2).with_params(vec!["n".into()]);
        let space = Space::set(3).with_params(vec!["n".into()]);
        assert!(space.alignment_with(&model).is_identity());
    }
}
