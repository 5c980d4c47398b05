//! Error types for the set/map algebra core.
//!
//! Infeasible intermediate states are never errors here; they are normal
//! backtracking. Errors are reserved for contract-level problems a caller
//! can act on.

use crate::space::Space;
use thiserror::Error;

/// Top-level error type for the crate.
#[derive(Error, Debug, Clone)]
pub enum PolysetError {
    /// Two values with incompatible spaces were passed to a binary
    /// operation. Parameters can be aligned automatically, but the
    /// non-parameter dimensions must agree.
    #[error("incompatible spaces: {left} vs {right}")]
    SpaceMismatch {
        /// Space of the left-hand operand.
        left: Space,
        /// Space of the right-hand operand.
        right: Space,
    },

    /// A caller-supplied merge/combine callback reported failure. The
    /// enclosing operation is aborted and no partial result is exposed.
    #[error("part merge failed: {0}")]
    MergeFailed(String),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PolysetError>;

impl PolysetError {
    pub(crate) fn space_mismatch(left: &Space, right: &Space) -> Self {
        PolysetError::SpaceMismatch {
            left: left.clone(),
            right: right.clone(),
        }
    }
}
