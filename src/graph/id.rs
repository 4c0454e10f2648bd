//! Handles for paths stored in a [`PathSet`](super::PathSet).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a path within a [`PathSet`](super::PathSet).
///
/// Handles order by their numeric value, so sets of handles iterate in
/// creation order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(pub usize);

impl PathId {
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for PathId {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path #{}", self.0)
    }
}

/// Comma separated list of raw ids, e.g. `"1,4,7"`.
pub fn id_list_string<I>(ids: I) -> String
where
    I: IntoIterator<Item = PathId>,
{
    ids.into_iter()
        .map(|PathId(id)| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_list_formatting() {
        assert_eq!(PathId::new(3).to_string(), "path #3");
        assert_eq!(id_list_string([PathId(1), PathId(4), PathId(7)]), "1,4,7");
        assert_eq!(id_list_string(Vec::new()), "");
    }

    #[test]
    fn serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PathId(12)).unwrap(), "12");
    }
}
