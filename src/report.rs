// 📋 Master List - Export rows + verification statistics
//
// Turns matched records into the sorted master list and computes:
//   verification rate          = verified / total
//   weighted verification rate = Σ confidence weight / total

use crate::confidence::{is_verified, Confidence};
use crate::matcher::{MatchType, MatchedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// EXPORT ROW
// ============================================================================

/// One line of the master list. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Survey_Display_Name")]
    pub survey_display_name: String,

    #[serde(rename = "Hoodie_ID")]
    pub hoodie_id: String,

    /// Survey license after normalization (empty when absent)
    #[serde(rename = "Hoodie_License")]
    pub hoodie_license: String,

    /// OLCC license when linked, otherwise the survey license
    #[serde(rename = "Verified_License")]
    pub verified_license: String,

    #[serde(rename = "OLCC_Business_Name")]
    pub olcc_business_name: String,

    #[serde(rename = "Match_Type")]
    pub match_type: MatchType,

    #[serde(rename = "Verification_Notes")]
    pub verification_notes: String,

    #[serde(rename = "Confidence_Score")]
    pub confidence_score: Confidence,

    /// Written as "Yes" / "No"
    #[serde(rename = "Is_Verified", with = "yes_no")]
    pub is_verified: bool,
}

/// `Is_Verified` column text
pub mod yes_no {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const YES: &str = "Yes";
    pub const NO: &str = "No";

    pub fn as_str(value: bool) -> &'static str {
        if value {
            YES
        } else {
            NO
        }
    }

    pub fn parse(text: &str) -> Option<bool> {
        match text {
            YES => Some(true),
            NO => Some(false),
            _ => None,
        }
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(as_str(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(&text), &"Yes or No"))
    }
}

/// `"{name} - {first comma segment of address}"`, "Unknown" for a blank address
pub fn display_name(dispensary_name: &str, raw_address: &str) -> String {
    let street_part = if raw_address.is_empty() {
        "Unknown"
    } else {
        raw_address.split(',').next().unwrap_or(raw_address)
    };
    format!("{} - {}", dispensary_name, street_part)
}

fn export_row(record: &MatchedRecord) -> ExportRow {
    let survey = &record.survey;
    let result = &record.result;
    let hoodie_license = record.normalized_license.clone().unwrap_or_default();

    let olcc_license = result
        .matched
        .as_ref()
        .map(|m| m.license_number.clone())
        .unwrap_or_default();
    let verified_license = if olcc_license.is_empty() {
        hoodie_license.clone()
    } else {
        olcc_license
    };

    ExportRow {
        survey_display_name: display_name(&survey.dispensary_name, &survey.raw_address),
        hoodie_id: survey.external_id.clone(),
        hoodie_license,
        verified_license,
        olcc_business_name: result
            .matched
            .as_ref()
            .map(|m| m.business_name.clone())
            .unwrap_or_default(),
        match_type: result.match_type,
        verification_notes: result.note.clone(),
        confidence_score: Confidence::for_match(result.match_type),
        is_verified: is_verified(result.match_type),
    }
}

/// Build export rows sorted by display name; ties keep survey file order.
pub fn build_master_list(records: &[MatchedRecord]) -> Vec<ExportRow> {
    let mut keyed: Vec<(usize, ExportRow)> = records
        .iter()
        .map(|r| (r.survey.position, export_row(r)))
        .collect();

    keyed.sort_by(|(pos_a, a), (pos_b, b)| {
        a.survey_display_name
            .cmp(&b.survey_display_name)
            .then(pos_a.cmp(pos_b))
    });

    keyed.into_iter().map(|(_, row)| row).collect()
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total: usize,
    pub verified: usize,

    /// verified / total (0.0 for an empty run)
    pub verification_rate: f64,

    /// Σ confidence weight / total (0.0 for an empty run). No_Match rows
    /// contribute 0.5 each, so this can exceed `verification_rate`.
    pub weighted_verification_rate: f64,

    /// Σ confidence weight of verified rows / total. Never above
    /// `verification_rate`; equal only when every verified row is High.
    pub verified_weighted_rate: f64,

    pub confidence_counts: BTreeMap<Confidence, usize>,
    pub match_type_counts: BTreeMap<MatchType, usize>,
}

impl MatchSummary {
    pub fn from_rows(rows: &[ExportRow]) -> Self {
        let total = rows.len();
        let verified = rows.iter().filter(|r| r.is_verified).count();

        let mut confidence_counts = BTreeMap::new();
        let mut match_type_counts = BTreeMap::new();
        let mut weighted_total = 0.0;
        let mut verified_weighted_total = 0.0;

        for row in rows {
            *confidence_counts.entry(row.confidence_score).or_insert(0) += 1;
            *match_type_counts.entry(row.match_type).or_insert(0) += 1;
            weighted_total += row.confidence_score.weight();
            if row.is_verified {
                verified_weighted_total += row.confidence_score.weight();
            }
        }

        let rate = |n: f64| if total > 0 { n / total as f64 } else { 0.0 };
        let verification_rate = rate(verified as f64);
        let weighted_verification_rate = rate(weighted_total);
        let verified_weighted_rate = rate(verified_weighted_total);

        MatchSummary {
            total,
            verified,
            verification_rate,
            weighted_verification_rate,
            verified_weighted_rate,
            confidence_counts,
            match_type_counts,
        }
    }

    pub fn count_for(&self, match_type: MatchType) -> usize {
        self.match_type_counts.get(&match_type).copied().unwrap_or(0)
    }

    pub fn count_for_confidence(&self, confidence: Confidence) -> usize {
        self.confidence_counts.get(&confidence).copied().unwrap_or(0)
    }

    /// Console report in the layout the survey team reads
    pub fn render(&self) -> String {
        let mut out = String::new();
        let pct = |n: usize| {
            if self.total > 0 {
                n as f64 / self.total as f64 * 100.0
            } else {
                0.0
            }
        };

        out.push_str("=== SUMMARY STATISTICS ===\n");
        out.push_str(&format!("Total dispensaries: {}\n", self.total));
        out.push_str(&format!("Verified dispensaries: {}\n", self.verified));
        out.push_str(&format!(
            "Verification rate: {:.1}%\n",
            self.verification_rate * 100.0
        ));

        out.push_str("\nConfidence breakdown:\n");
        for confidence in Confidence::ALL {
            let count = self.count_for_confidence(confidence);
            if count > 0 {
                out.push_str(&format!("  {}: {} ({:.1}%)\n", confidence, count, pct(count)));
            }
        }

        out.push_str("\nMatch type breakdown:\n");
        let mut by_name: Vec<(&str, usize)> = self
            .match_type_counts
            .iter()
            .map(|(m, c)| (m.as_str(), *c))
            .collect();
        by_name.sort();
        for (name, count) in by_name {
            out.push_str(&format!("  {}: {}\n", name, count));
        }

        out.push_str(&format!(
            "\nWeighted verification rate: {:.1}% (accounts for confidence levels)\n",
            self.weighted_verification_rate * 100.0
        ));

        out
    }
}

/// Sorted master list plus its statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterReport {
    pub rows: Vec<ExportRow>,
    pub summary: MatchSummary,
}

impl MasterReport {
    pub fn build(records: &[MatchedRecord]) -> Self {
        let rows = build_master_list(records);
        let summary = MatchSummary::from_rows(&rows);
        MasterReport { rows, summary }
    }
}

// ============================================================================
// TESTS
// ============================================================================
