//! Intent tags
//!
//! Coarse categories of customer inquiry. The set is closed; `General` is the
//! mandatory fallback every company profile must define.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Customer intent category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntentTag {
    Sales,
    Service,
    Insurance,
    /// Annual maintenance contract
    Amc,
    #[default]
    General,
    Complaint,
    Feedback,
}

impl IntentTag {
    /// All tags, in canonical declaration order (fallback last)
    pub const ALL: [IntentTag; 7] = [
        IntentTag::Sales,
        IntentTag::Service,
        IntentTag::Insurance,
        IntentTag::Amc,
        IntentTag::Complaint,
        IntentTag::Feedback,
        IntentTag::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Service => "service",
            Self::Insurance => "insurance",
            Self::Amc => "amc",
            Self::General => "general",
            Self::Complaint => "complaint",
            Self::Feedback => "feedback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::General)
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown intent '{}'", s)))
    }
}
