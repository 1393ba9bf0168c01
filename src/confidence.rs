// 📊 Confidence Scorer - Match tier → label + weight
//
//   License_Exact   → High         1.00
//   Address_Name    → Medium_High  0.95
//   Address_Only    → Medium       0.85
//   Address_Partial → Medium       0.85
//   No_Match        → Low          0.50

use crate::matcher::MatchType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "High")]
    High,
    #[serde(rename = "Medium_High")]
    MediumHigh,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Low")]
    Low,
}

impl Confidence {
    /// Every label, strongest first (report ordering)
    pub const ALL: [Confidence; 4] = [
        Confidence::High,
        Confidence::MediumHigh,
        Confidence::Medium,
        Confidence::Low,
    ];

    pub fn for_match(match_type: MatchType) -> Self {
        match match_type {
            MatchType::LicenseExact => Confidence::High,
            MatchType::AddressName => Confidence::MediumHigh,
            MatchType::AddressOnly | MatchType::AddressPartial => Confidence::Medium,
            MatchType::NoMatch => Confidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::MediumHigh => "Medium_High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }

    /// Weight used by the weighted verification rate
    pub fn weight(&self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::MediumHigh => 0.95,
            Confidence::Medium => 0.85,
            Confidence::Low => 0.5,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Confidence::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record counts as verified for any tier except No_Match
pub fn is_verified(match_type: MatchType) -> bool {
    match_type != MatchType::NoMatch
}
