// ⚙️ Matcher Config - Rules as data
// Which licensing rows count, and how source columns are found.
//
// Loaded from JSON the same way classification rules are: the file is
// optional, every field has a default matching the OLCC/Hoodie exports.

use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// LICENSING FILTER
// ============================================================================

/// Predicate applied to licensing rows before indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseFilter {
    /// Required `Status` value (compared after trimming, case-sensitive)
    pub status: String,

    /// Required `License Type` value (compared after trimming, case-sensitive)
    pub license_type: String,
}

impl Default for LicenseFilter {
    fn default() -> Self {
        LicenseFilter {
            status: "ACTIVE".to_string(),
            license_type: "RECREATIONAL RETAILER".to_string(),
        }
    }
}

impl LicenseFilter {
    pub fn accepts(&self, status: &str, license_type: &str) -> bool {
        status.trim() == self.status && license_type.trim() == self.license_type
    }
}

// ============================================================================
// SURVEY HEADERS (matched by substring)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyHeaders {
    pub license: String,
    pub address: String,
    pub dispensary: String,
    pub external_id: String,
}

impl Default for SurveyHeaders {
    fn default() -> Self {
        SurveyHeaders {
            license: "License".to_string(),
            address: "Address".to_string(),
            dispensary: "Dispensary".to_string(),
            external_id: "Hoodie ID".to_string(),
        }
    }
}

// ============================================================================
// LICENSING COLUMNS (exact names)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensingColumns {
    pub status: String,
    pub license_type: String,
    pub license_number: String,
    pub business_name: String,
    pub physical_address: String,
}

impl Default for LicensingColumns {
    fn default() -> Self {
        LicensingColumns {
            status: "Status".to_string(),
            license_type: "License Type".to_string(),
            license_number: "License Number".to_string(),
            business_name: "Business Name".to_string(),
            physical_address: "PhysicalAddress".to_string(),
        }
    }
}

// ============================================================================
// MATCHER CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub license_filter: LicenseFilter,
    pub survey_headers: SurveyHeaders,
    pub licensing_columns: LicensingColumns,
}

impl MatcherConfig {
    /// Load config from a JSON file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: MatcherConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject blank values: an empty substring would match every header
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("license_filter.status", &self.license_filter.status),
            ("license_filter.license_type", &self.license_filter.license_type),
            ("survey_headers.license", &self.survey_headers.license),
            ("survey_headers.address", &self.survey_headers.address),
            ("survey_headers.dispensary", &self.survey_headers.dispensary),
            ("survey_headers.external_id", &self.survey_headers.external_id),
            ("licensing_columns.status", &self.licensing_columns.status),
            ("licensing_columns.license_type", &self.licensing_columns.license_type),
            ("licensing_columns.license_number", &self.licensing_columns.license_number),
            ("licensing_columns.business_name", &self.licensing_columns.business_name),
            ("licensing_columns.physical_address", &self.licensing_columns.physical_address),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(MatchError::ConfigValidation(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_olcc_export() {
        let config = MatcherConfig::default();

        assert_eq!(config.license_filter.status, "ACTIVE");
        assert_eq!(config.license_filter.license_type, "RECREATIONAL RETAILER");
        assert_eq!(config.survey_headers.external_id, "Hoodie ID");
        assert_eq!(config.licensing_columns.physical_address, "PhysicalAddress");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_filter_accepts_trimmed_exact_values() {
        let filter = LicenseFilter::default();

        assert!(filter.accepts("ACTIVE", "RECREATIONAL RETAILER"));
        assert!(filter.accepts(" ACTIVE ", "RECREATIONAL RETAILER "));
        assert!(!filter.accepts("active", "RECREATIONAL RETAILER"));
        assert!(!filter.accepts("ACTIVE", "RECREATIONAL PRODUCER"));
        assert!(!filter.accepts("SURRENDERED", "RECREATIONAL RETAILER"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MatcherConfig::from_json(
            r#"{ "survey_headers": { "external_id": "Survey ID" } }"#,
        )
        .unwrap();

        assert_eq!(config.survey_headers.external_id, "Survey ID");
        assert_eq!(config.survey_headers.license, "License");
        assert_eq!(config.license_filter, LicenseFilter::default());
    }

    #[test]
    fn test_blank_value_rejected() {
        let result = MatcherConfig::from_json(r#"{ "survey_headers": { "address": " " } }"#);

        assert!(matches!(result, Err(MatchError::ConfigValidation(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matcher.json");
        fs::write(&path, r#"{ "license_filter": { "license_type": "MEDICAL RETAILER" } }"#).unwrap();

        let config = MatcherConfig::from_file(&path).unwrap();

        assert_eq!(config.license_filter.license_type, "MEDICAL RETAILER");
        assert_eq!(config.license_filter.status, "ACTIVE");
        assert!(matches!(
            MatcherConfig::from_file(dir.path().join("missing.json")),
            Err(MatchError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let result = MatcherConfig::from_json("{ not json");

        assert!(matches!(result, Err(MatchError::ConfigParse(_))));
    }
}
