// 🧭 Column Discovery - Find survey fields by header substring
//
// Survey exports rename their columns between downloads ("License #",
// "OLCC License", ...). Discovery runs once, before matching, and produces a
// typed mapping or a MissingColumn error naming the substring it looked for.

use crate::config::SurveyHeaders;
use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};

/// Resolved survey column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyColumns {
    pub license: String,
    pub address: String,
    pub dispensary: String,
    pub external_id: String,
}

impl SurveyColumns {
    /// Resolve each field to the first header containing its substring
    pub fn discover(headers: &[String], wanted: &SurveyHeaders) -> Result<Self> {
        Ok(SurveyColumns {
            license: find_header(headers, &wanted.license)?,
            address: find_header(headers, &wanted.address)?,
            dispensary: find_header(headers, &wanted.dispensary)?,
            external_id: find_header(headers, &wanted.external_id)?,
        })
    }
}

fn find_header(headers: &[String], needle: &str) -> Result<String> {
    headers
        .iter()
        .find(|h| h.contains(needle))
        .cloned()
        .ok_or_else(|| MatchError::MissingColumn {
            source_name: "survey".to_string(),
            needle: needle.to_string(),
            headers: headers.to_vec(),
        })
}

/// Strip a byte-order mark and surrounding quotes/whitespace from a header
pub fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_discover_by_substring() {
        let hs = headers(&["Hoodie ID", "Dispensary Name", "Full Address", "OLCC License #"]);

        let columns = SurveyColumns::discover(&hs, &SurveyHeaders::default()).unwrap();

        assert_eq!(columns.license, "OLCC License #");
        assert_eq!(columns.address, "Full Address");
        assert_eq!(columns.dispensary, "Dispensary Name");
        assert_eq!(columns.external_id, "Hoodie ID");
    }

    #[test]
    fn test_first_matching_header_wins() {
        let hs = headers(&[
            "Hoodie ID",
            "Dispensary",
            "Address",
            "Mailing Address",
            "License",
            "License Expiry",
        ]);

        let columns = SurveyColumns::discover(&hs, &SurveyHeaders::default()).unwrap();

        assert_eq!(columns.address, "Address");
        assert_eq!(columns.license, "License");
    }

    #[test]
    fn test_missing_column_is_reported() {
        let hs = headers(&["Hoodie ID", "Dispensary", "Address"]);

        let err = SurveyColumns::discover(&hs, &SurveyHeaders::default()).unwrap_err();

        match err {
            MatchError::MissingColumn { needle, headers, .. } => {
                assert_eq!(needle, "License");
                assert_eq!(headers.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_clean_header() {
        assert_eq!(clean_header("\u{feff}\"Hoodie ID\""), "Hoodie ID");
        assert_eq!(clean_header("  License # "), "License #");
        assert_eq!(clean_header("Address"), "Address");
    }
}
