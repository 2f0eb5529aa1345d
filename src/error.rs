//! Crate-wide error type and result alias.
//!
//! Shape and configuration problems are detected at operator construction
//! wherever possible and reported immediately; applying an operator to an
//! input of the wrong length is the remaining apply-time shape check.
//! Every message carries the offending values and the violated constraint.

use thiserror::Error;

/// Errors produced by operator constructors and applications.
#[derive(Debug, Error)]
pub enum Error {
    /// Operand shapes are incompatible with the requested operation.
    #[error("{op}: shape mismatch: {details}")]
    ShapeMismatch {
        /// Operation that rejected the shapes.
        op: &'static str,
        /// Offending dimensions and the expected relation.
        details: String,
    },

    /// A parameter value is outside the operation's contract.
    #[error("invalid argument `{arg}`: {reason}")]
    InvalidArgument {
        /// Name of the rejected parameter.
        arg: &'static str,
        /// Offending value and the expected constraint.
        reason: String,
    },

    /// A backend could not produce a finite result.
    #[error("{op}: numerical failure: {reason}")]
    Numerical {
        /// Operation whose output failed the finiteness check.
        op: &'static str,
        /// Affected sample range or quantity.
        reason: String,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
