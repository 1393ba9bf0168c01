// 🔗 Match Engine - Link survey listings to OLCC licensees
//
// Tiers, first success wins:
//   1. License_Exact   normalized license found in by_license
//   2. Address_*       normalized address found in by_address
//   3. Address_*       street prefix found in by_street_prefix (first entry)
//   4. No_Match
//
// Tier 1 runs as a complete pass over every survey record before any
// address tier runs; only records it leaves unmatched reach tiers 2-3.

use crate::index::LicenseIndex;
use crate::normalize::{extract_street_prefix, names_overlap, normalize_address, normalize_license};
use crate::records::{LicenseRecord, SurveyRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

pub const NOTE_LICENSE_EXACT: &str = "Perfect license match";
pub const NOTE_ADDRESS_NAME: &str = "Same address + business name, different license";
pub const NOTE_ADDRESS_ONLY: &str = "Same address, different business name/license";
pub const NOTE_STREET_NAME: &str = "Same street + business name, different license";
pub const NOTE_STREET_PARTIAL: &str = "Same street address, different business/license";
pub const NOTE_NO_MATCH: &str = "Not found in OLCC database";

// ============================================================================
// MATCH TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "License_Exact")]
    LicenseExact,
    #[serde(rename = "Address_Name")]
    AddressName,
    #[serde(rename = "Address_Only")]
    AddressOnly,
    #[serde(rename = "Address_Partial")]
    AddressPartial,
    #[serde(rename = "No_Match")]
    NoMatch,
}

impl MatchType {
    pub const ALL: [MatchType; 5] = [
        MatchType::LicenseExact,
        MatchType::AddressName,
        MatchType::AddressOnly,
        MatchType::AddressPartial,
        MatchType::NoMatch,
    ];

    /// Wire name used in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::LicenseExact => "License_Exact",
            MatchType::AddressName => "Address_Name",
            MatchType::AddressOnly => "Address_Only",
            MatchType::AddressPartial => "Address_Partial",
            MatchType::NoMatch => "No_Match",
        }
    }

    /// Parse a wire name, case-insensitively (used by filters)
    pub fn parse(name: &str) -> Option<Self> {
        MatchType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_type: MatchType,

    /// Licensee the record was linked to (None only for No_Match)
    pub matched: Option<LicenseRecord>,

    /// Human-readable reason
    pub note: String,

    /// Licensees that shared the winning key (>1 only for street-prefix ties)
    pub candidates: usize,
}

impl MatchResult {
    fn linked(match_type: MatchType, record: &LicenseRecord, note: &str, candidates: usize) -> Self {
        MatchResult {
            match_type,
            matched: Some(record.clone()),
            note: note.to_string(),
            candidates,
        }
    }

    pub fn no_match() -> Self {
        MatchResult {
            match_type: MatchType::NoMatch,
            matched: None,
            note: NOTE_NO_MATCH.to_string(),
            candidates: 0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.match_type != MatchType::NoMatch
    }
}

/// A survey record plus its linkage outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub survey: SurveyRecord,
    pub normalized_license: Option<String>,
    pub result: MatchResult,
}

// ============================================================================
// TIERS
// ============================================================================

/// Tier 1: exact normalized license lookup
pub fn match_license(survey: &SurveyRecord, index: &LicenseIndex) -> Option<MatchResult> {
    let license = normalize_license(Some(&survey.raw_license))?;
    let record = index.by_license(&license)?;

    Some(MatchResult::linked(MatchType::LicenseExact, record, NOTE_LICENSE_EXACT, 1))
}

/// Tier 2: exact normalized address lookup, name-corroborated when possible
pub fn match_address_exact(survey: &SurveyRecord, index: &LicenseIndex) -> Option<MatchResult> {
    let address = normalize_address(Some(&survey.raw_address));
    if address.is_empty() {
        return None;
    }
    let record = index.by_address(&address)?;

    let result = if names_overlap(&survey.dispensary_name, &record.business_name) {
        MatchResult::linked(MatchType::AddressName, record, NOTE_ADDRESS_NAME, 1)
    } else {
        MatchResult::linked(MatchType::AddressOnly, record, NOTE_ADDRESS_ONLY, 1)
    };
    Some(result)
}

/// Tier 3: street-prefix bucket, first licensee in file order.
///
/// When several licensees share the prefix only the first is considered,
/// even if a later one would corroborate the name. `candidates` records the
/// bucket size so ambiguous links can be reviewed.
pub fn match_street_prefix(survey: &SurveyRecord, index: &LicenseIndex) -> Option<MatchResult> {
    let street = extract_street_prefix(Some(&survey.raw_address));
    if street.is_empty() {
        return None;
    }
    let bucket = index.by_street_prefix(&street);
    let record = *bucket.first()?;

    let result = if names_overlap(&survey.dispensary_name, &record.business_name) {
        MatchResult::linked(MatchType::AddressName, record, NOTE_STREET_NAME, bucket.len())
    } else {
        MatchResult::linked(MatchType::AddressPartial, record, NOTE_STREET_PARTIAL, bucket.len())
    };
    Some(result)
}

// ============================================================================
// PASSES
// ============================================================================

fn matched(survey: SurveyRecord, result: MatchResult) -> MatchedRecord {
    let normalized_license = normalize_license(Some(&survey.raw_license));
    MatchedRecord {
        survey,
        normalized_license,
        result,
    }
}

/// License pass over every survey record.
///
/// Returns (license-matched, still-unmatched). Matching is read-only on the
/// index, so any number of survey records may link to the same licensee.
pub fn match_by_license(
    survey: Vec<SurveyRecord>,
    index: &LicenseIndex,
) -> (Vec<MatchedRecord>, Vec<SurveyRecord>) {
    let mut hits = Vec::new();
    let mut unmatched = Vec::new();

    for record in survey {
        match match_license(&record, index) {
            Some(result) => hits.push(matched(record, result)),
            None => unmatched.push(record),
        }
    }

    info!(
        matched = hits.len(),
        unmatched = unmatched.len(),
        "license pass complete"
    );

    (hits, unmatched)
}

/// Address pass over records the license pass left unmatched.
///
/// Every input record comes back exactly once, as an address tier or No_Match.
pub fn match_by_address(unmatched: Vec<SurveyRecord>, index: &LicenseIndex) -> Vec<MatchedRecord> {
    let mut address_hits = 0;

    let out: Vec<MatchedRecord> = unmatched
        .into_iter()
        .map(|record| {
            let result = match_address_exact(&record, index)
                .or_else(|| match_street_prefix(&record, index))
                .unwrap_or_else(MatchResult::no_match);

            if result.is_match() {
                address_hits += 1;
            }
            debug!(
                dispensary = %record.dispensary_name,
                match_type = %result.match_type,
                candidates = result.candidates,
                "address pass decision"
            );

            matched(record, result)
        })
        .collect();

    info!(matched = address_hits, "address pass complete");
    out
}

/// Both passes, license first. Output order: license hits, then the rest.
pub fn match_all(survey: Vec<SurveyRecord>, index: &LicenseIndex) -> Vec<MatchedRecord> {
    let (mut results, unmatched) = match_by_license(survey, index);
    results.extend(match_by_address(unmatched, index));
    results
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn license(number: &str, name: &str, address: &str) -> LicenseRecord {
        LicenseRecord {
            license_number: number.to_string(),
            business_name: name.to_string(),
            physical_address: address.to_string(),
            status: "ACTIVE".to_string(),
            license_type: "RECREATIONAL RETAILER".to_string(),
        }
    }

    fn survey(position: usize, name: &str, address: &str, license: &str) -> SurveyRecord {
        SurveyRecord {
            position,
            dispensary_name: name.to_string(),
            raw_address: address.to_string(),
            raw_license: license.to_string(),
            external_id: format!("H{}", position),
        }
    }

    fn only(records: Vec<MatchedRecord>) -> MatchedRecord {
        assert_eq!(records.len(), 1);
        records.into_iter().next().unwrap()
    }

    #[test]
    fn test_license_exact() {
        let index = LicenseIndex::build(vec![license(
            "050-1234567",
            "Green Leaf LLC",
            "123 Main Street, Portland, OR",
        )]);

        let out = only(match_all(
            vec![survey(0, "Green Leaf", "123 Main St, Portland, OR 97201", "50-1234567")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::LicenseExact);
        assert_eq!(out.result.note, NOTE_LICENSE_EXACT);
        assert_eq!(out.normalized_license.as_deref(), Some("050-1234567"));
        assert_eq!(
            out.result.matched.unwrap().license_number,
            "050-1234567"
        );
    }

    #[test]
    fn test_license_tier_beats_address_tier() {
        // License points at one licensee, address at another
        let index = LicenseIndex::build(vec![
            license("050-1111111", "License Holder", "9 Far Away Rd"),
            license("050-2222222", "Address Holder", "1 Main St"),
        ]);

        let out = only(match_all(
            vec![survey(0, "Address Holder", "1 Main Street", "0501111111")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::LicenseExact);
        assert_eq!(out.result.matched.unwrap().business_name, "License Holder");
    }

    #[test]
    fn test_shared_license_matches_every_record() {
        let index = LicenseIndex::build(vec![license("050-1", "Shop", "1 Main St")]);
        let records = vec![
            survey(0, "Shop East", "nowhere", "050 1"),
            survey(1, "Shop West", "elsewhere", "#0501"),
        ];

        let (hits, unmatched) = match_by_license(records.clone(), &index);
        assert_eq!(hits.len(), 2);
        assert!(unmatched.is_empty());

        let mut reversed = records;
        reversed.reverse();
        let out = match_all(reversed, &index);
        assert!(out
            .iter()
            .all(|r| r.result.match_type == MatchType::LicenseExact));
    }

    #[test]
    fn test_address_name() {
        let index = LicenseIndex::build(vec![license(
            "050-9",
            "GREEN LEAF LLC",
            "123 Main Street, Portland, OR 97201",
        )]);

        let out = only(match_all(
            vec![survey(0, "Green Leaf", "123 Main St, Portland, OR 97201", "")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::AddressName);
        assert_eq!(out.result.note, NOTE_ADDRESS_NAME);
        assert_eq!(out.normalized_license, None);
    }

    #[test]
    fn test_address_only() {
        let index = LicenseIndex::build(vec![license("050-9", "Rebrand Co", "123 Main St")]);

        let out = only(match_all(
            vec![survey(0, "Green Leaf", "123 Main Street", "050-0000000")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::AddressOnly);
        assert_eq!(out.result.note, NOTE_ADDRESS_ONLY);
        assert_eq!(out.result.matched.unwrap().business_name, "Rebrand Co");
    }

    #[test]
    fn test_street_prefix_name() {
        let index = LicenseIndex::build(vec![license(
            "050-9",
            "Green Leaf Dispensary",
            "123 Main St Suite 4, Portland, OR 97201",
        )]);

        let out = only(match_all(
            vec![survey(0, "Green Leaf", "123 Main Street, Portland", "")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::AddressName);
        assert_eq!(out.result.note, NOTE_STREET_NAME);
    }

    #[test]
    fn test_street_prefix_partial() {
        let index = LicenseIndex::build(vec![license(
            "050-9",
            "Someone Else",
            "123 Main St Suite 4, Portland, OR 97201",
        )]);

        let out = only(match_all(
            vec![survey(0, "Green Leaf", "123 Main Street, Portland", "")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::AddressPartial);
        assert_eq!(out.result.note, NOTE_STREET_PARTIAL);
    }

    #[test]
    fn test_street_prefix_takes_first_inserted() {
        let records = vec![
            license("050-1", "First Suite", "200 Pine St Ste A, Bend, OR 97701"),
            license("050-2", "Second Suite", "200 Pine St Ste B, Bend, OR 97701"),
        ];

        for _ in 0..3 {
            let index = LicenseIndex::build(records.clone());
            let out = only(match_all(
                vec![survey(0, "Second Suite", "200 Pine Street", "")],
                &index,
            ));

            // First entry wins even though the second would match the name
            assert_eq!(out.result.match_type, MatchType::AddressPartial);
            assert_eq!(out.result.matched.unwrap().business_name, "First Suite");
            assert_eq!(out.result.candidates, 2);
        }
    }

    #[test]
    fn test_no_match() {
        let index = LicenseIndex::build(vec![license("050-1", "Shop", "1 Main St")]);

        let out = only(match_all(
            vec![survey(0, "Ghost", "77 Nowhere Ave, Salem, OR 97301", "Unspecified")],
            &index,
        ));

        assert_eq!(out.result.match_type, MatchType::NoMatch);
        assert_eq!(out.result.note, NOTE_NO_MATCH);
        assert!(out.result.matched.is_none());
        assert_eq!(out.normalized_license, None);
    }

    #[test]
    fn test_empty_address_never_matches() {
        let index = LicenseIndex::build(vec![license("050-1", "Shop", "")]);

        let out = only(match_all(vec![survey(0, "Shop", "", "")], &index));

        assert_eq!(out.result.match_type, MatchType::NoMatch);
    }

    #[test]
    fn test_every_record_resolved_once() {
        let index = LicenseIndex::build(vec![
            license("050-1", "A", "1 Main St"),
            license("050-2", "B", "2 Main St"),
        ]);
        let records = vec![
            survey(0, "A", "", "050-1"),
            survey(1, "B", "2 Main Street", ""),
            survey(2, "C", "3 Main St", ""),
            survey(3, "D", "", ""),
        ];

        let out = match_all(records, &index);

        let mut positions: Vec<usize> = out.iter().map(|r| r.survey.position).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_match_type_parse() {
        assert_eq!(MatchType::parse("license_exact"), Some(MatchType::LicenseExact));
        assert_eq!(MatchType::parse("No_Match"), Some(MatchType::NoMatch));
        assert_eq!(MatchType::parse("fuzzy"), None);
    }
}
