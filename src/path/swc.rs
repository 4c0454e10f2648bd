//! SWC morphological type tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Morphological classification of a path, using the SWC numeric codes.
///
/// `ForkPoint` and `EndPoint` are legacy tags kept so that older data still
/// reads back; they behave like [`SwcType::Undefined`] everywhere else.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwcType {
    #[default]
    Undefined,
    Soma,
    Axon,
    Dendrite,
    ApicalDendrite,
    ForkPoint,
    EndPoint,
    Custom,
}

impl SwcType {
    /// Non-redundant tags, in code order.
    pub const CANONICAL: [Self; 6] = [
        Self::Undefined,
        Self::Soma,
        Self::Axon,
        Self::Dendrite,
        Self::ApicalDendrite,
        Self::Custom,
    ];

    /// Tag for an SWC code; `None` for codes outside `0..=7`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Undefined,
            1 => Self::Soma,
            2 => Self::Axon,
            3 => Self::Dendrite,
            4 => Self::ApicalDendrite,
            5 => Self::ForkPoint,
            6 => Self::EndPoint,
            7 => Self::Custom,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Soma => 1,
            Self::Axon => 2,
            Self::Dendrite => 3,
            Self::ApicalDendrite => 4,
            Self::ForkPoint => 5,
            Self::EndPoint => 6,
            Self::Custom => 7,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Soma => "soma",
            Self::Axon => "axon",
            Self::Dendrite => "(basal) dendrite",
            Self::ApicalDendrite => "apical dendrite",
            Self::ForkPoint => "fork point",
            Self::EndPoint => "end point",
            Self::Custom => "custom",
        }
    }

    /// Label with the first letter of every word in upper case,
    /// e.g. `"(Basal) Dendrite"`.
    #[must_use]
    pub fn capitalized_label(self) -> String {
        let mut capitalize_next = true;
        self.label()
            .chars()
            .map(|ch| {
                if !ch.is_alphabetic() {
                    capitalize_next = true;
                    ch
                } else if capitalize_next {
                    capitalize_next = false;
                    ch.to_ascii_uppercase()
                } else {
                    ch
                }
            })
            .collect()
    }

    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::ForkPoint | Self::EndPoint)
    }
}

impl fmt::Display for SwcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..=7 {
            let ty = SwcType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(SwcType::from_code(8), None);
    }

    #[test]
    fn canonical_list_skips_legacy_tags() {
        assert!(SwcType::CANONICAL.iter().all(|t| !t.is_legacy()));
        assert!(SwcType::ForkPoint.is_legacy());
        assert!(SwcType::EndPoint.is_legacy());
    }

    #[test]
    fn capitalizes_every_word() {
        assert_eq!(SwcType::Dendrite.capitalized_label(), "(Basal) Dendrite");
        assert_eq!(SwcType::ApicalDendrite.capitalized_label(), "Apical Dendrite");
        assert_eq!(SwcType::Soma.capitalized_label(), "Soma");
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&SwcType::ApicalDendrite).unwrap(),
            "\"apical_dendrite\""
        );
    }
}
