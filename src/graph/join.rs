//! Directional joins between paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::Point3;

use super::id::PathId;

/// End of a path that can be joined onto another path.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinEnd {
    Start,
    End,
}

impl JoinEnd {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Start => Self::End,
            Self::End => Self::Start,
        }
    }
}

impl fmt::Display for JoinEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::End => "end",
        })
    }
}

/// A join from one end of a path onto `target`, anchored at `point`.
///
/// `point` lies on the target path (it is the node the end was traced from
/// or to).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub target: PathId,
    pub point: Point3,
}

impl Join {
    #[must_use]
    pub const fn new(target: PathId, point: Point3) -> Self {
        Self { target, point }
    }
}

/// Occupancy of the two directional join slots of a path.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum JoinState {
    Unjoined,
    StartJoined,
    EndJoined,
    BothJoined,
}

impl JoinState {
    #[must_use]
    pub const fn from_slots(start: bool, end: bool) -> Self {
        match (start, end) {
            (false, false) => Self::Unjoined,
            (true, false) => Self::StartJoined,
            (false, true) => Self::EndJoined,
            (true, true) => Self::BothJoined,
        }
    }

    #[must_use]
    pub const fn is_joined(self, end: JoinEnd) -> bool {
        matches!(
            (self, end),
            (Self::StartJoined | Self::BothJoined, JoinEnd::Start)
                | (Self::EndJoined | Self::BothJoined, JoinEnd::End)
        )
    }
}

/// Reasons a join operation is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("the {end} of {path} is already joined; unset it first")]
    EndAlreadyJoined { path: PathId, end: JoinEnd },

    #[error("the {end} of {path} has no join to remove")]
    EndNotJoined { path: PathId, end: JoinEnd },

    #[error("join target {0} does not exist")]
    UnknownTarget(PathId),

    #[error("{0} cannot be joined onto itself")]
    SelfJoin(PathId),

    #[error("joining {path} onto {other} would create a cycle")]
    WouldCreateCycle { path: PathId, other: PathId },
}
