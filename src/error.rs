//! Error taxonomy shared by buffers, paths and the path set.
//!
//! Every variant signals a contract violation by the caller. Operations that
//! return one of these leave all involved paths untouched.

use thiserror::Error;

use crate::graph::id::PathId;
use crate::graph::join::JoinError;

/// Result type for path operations.
pub type PathResult<T> = Result<T, PathError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    /// A node index outside `[0, len)` (or `[0, len]` for insertion).
    #[error("node index {index} is out of range for a path with {len} nodes")]
    OutOfRangeIndex { index: usize, len: usize },

    /// A join could not be set or removed.
    #[error("invalid join state: {0}")]
    InvalidJoinState(#[from] JoinError),

    /// A per-node array does not have one entry per node.
    #[error("{attribute} array must have {expected} elements (one per node), got {actual}")]
    ShapeMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Concatenation onto a path whose end is already joined.
    #[error("cannot append to {0}: its end is already joined")]
    IllegalConcatenation(PathId),

    /// Radii must be finite and non-negative.
    #[error("radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),

    /// Radius-dependent geometry requested on a path without radii.
    #[error("path has no radii; radius-dependent geometry is undefined")]
    DegenerateRadiusState,

    /// The handle does not refer to a path of this set.
    #[error("{0} is not part of this path set")]
    UnknownPath(PathId),

    /// The identifier of a path can be assigned once only.
    #[error("path already carries identifier {0}")]
    IdAlreadyAssigned(PathId),

    /// A fitted version exists already and must be cleared first.
    #[error("path already has a fitted version")]
    FittedAlreadySet,

    /// The fitted version was requested but never assigned.
    #[error("path has no fitted version")]
    NoFittedVersion,

    /// Spacing values must be finite and positive.
    #[error("invalid calibration: {reason}")]
    InvalidCalibration { reason: String },
}
