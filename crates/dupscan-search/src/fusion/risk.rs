//! Risk classification of overlap scores.
//!
//! Boundaries come from `[search]` in `.dupscan/config.toml`:
//!
//! | Score                                | Risk               |
//! |--------------------------------------|--------------------|
//! | `>= likely_duplicate_threshold`      | `likely_duplicate` |
//! | `>= possibly_related_threshold`      | `possibly_related` |
//! | `>= maybe_related_threshold`         | `maybe_related`    |
//! | below                                | `none`             |

use dupscan_core::config::SearchConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How likely a candidate is to duplicate the submitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRisk {
    /// Not considered a duplicate.
    None,
    /// Some overlap, low confidence.
    MaybeRelated,
    /// Strong overlap, worth reviewing.
    PossiblyRelated,
    /// Almost certainly the same content.
    LikelyDuplicate,
}

impl DuplicateRisk {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MaybeRelated => "maybe_related",
            Self::PossiblyRelated => "possibly_related",
            Self::LikelyDuplicate => "likely_duplicate",
        }
    }
}

impl fmt::Display for DuplicateRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an overlap score to a [`DuplicateRisk`].
#[must_use]
pub fn classify_risk(score: f32, config: &SearchConfig) -> DuplicateRisk {
    if score >= config.likely_duplicate_threshold {
        DuplicateRisk::LikelyDuplicate
    } else if score >= config.possibly_related_threshold {
        DuplicateRisk::PossiblyRelated
    } else if score >= config.maybe_related_threshold {
        DuplicateRisk::MaybeRelated
    } else {
        DuplicateRisk::None
    }
}
