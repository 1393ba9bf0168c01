// 🏪 Source Records - Licensing and survey rows as typed values
//
// Rows arrive from the CSV adapter as column-name → value maps. A missing
// column value reads as an empty string; nothing here fails.

use crate::config::{LicenseFilter, LicensingColumns};
use crate::columns::SurveyColumns;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One decoded CSV row
pub type Row = HashMap<String, String>;

fn field(row: &Row, column: &str) -> String {
    row.get(column).cloned().unwrap_or_default()
}

// ============================================================================
// LICENSE RECORD (regulatory source)
// ============================================================================

/// A licensee from the OLCC dataset. Read-only after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// License number exactly as published
    pub license_number: String,
    pub business_name: String,
    pub physical_address: String,
    pub status: String,
    pub license_type: String,
}

impl LicenseRecord {
    pub fn from_row(row: &Row, columns: &LicensingColumns) -> Self {
        LicenseRecord {
            license_number: field(row, &columns.license_number),
            business_name: field(row, &columns.business_name),
            physical_address: field(row, &columns.physical_address),
            status: field(row, &columns.status),
            license_type: field(row, &columns.license_type),
        }
    }
}

/// Keep only rows passing the licensing filter, in source order.
///
/// Order matters: street-prefix buckets are filled in this order and the
/// first entry of a bucket wins.
pub fn filter_active_retailers(
    rows: &[Row],
    columns: &LicensingColumns,
    filter: &LicenseFilter,
) -> Vec<LicenseRecord> {
    rows.iter()
        .map(|row| LicenseRecord::from_row(row, columns))
        .filter(|record| filter.accepts(&record.status, &record.license_type))
        .collect()
}

// ============================================================================
// SURVEY RECORD (survey source)
// ============================================================================

/// A dispensary listing from the survey export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    /// Zero-based position in the survey file (tie-break for sorting)
    pub position: usize,
    pub dispensary_name: String,
    pub raw_address: String,
    pub raw_license: String,
    /// Survey-side identifier (Hoodie ID)
    pub external_id: String,
}

impl SurveyRecord {
    pub fn from_row(position: usize, row: &Row, columns: &SurveyColumns) -> Self {
        SurveyRecord {
            position,
            dispensary_name: field(row, &columns.dispensary),
            raw_address: field(row, &columns.address),
            raw_license: field(row, &columns.license),
            external_id: field(row, &columns.external_id),
        }
    }

    /// Build survey records for every row, preserving file order
    pub fn from_rows(rows: &[Row], columns: &SurveyColumns) -> Vec<SurveyRecord> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| SurveyRecord::from_row(i, row, columns))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn olcc_row(status: &str, license_type: &str, number: &str) -> Row {
        row(&[
            ("Status", status),
            ("License Type", license_type),
            ("License Number", number),
            ("Business Name", "Some Shop"),
            ("PhysicalAddress", "1 Main St"),
        ])
    }

    #[test]
    fn test_filter_keeps_active_retailers_in_order() {
        let rows = vec![
            olcc_row("ACTIVE", "RECREATIONAL RETAILER", "050-1"),
            olcc_row("ACTIVE", "RECREATIONAL PRODUCER", "020-2"),
            olcc_row("EXPIRED", "RECREATIONAL RETAILER", "050-3"),
            olcc_row("ACTIVE ", "RECREATIONAL RETAILER", "050-4"),
        ];

        let kept = filter_active_retailers(
            &rows,
            &LicensingColumns::default(),
            &LicenseFilter::default(),
        );

        let numbers: Vec<&str> = kept.iter().map(|r| r.license_number.as_str()).collect();
        assert_eq!(numbers, vec!["050-1", "050-4"]);
    }

    #[test]
    fn test_missing_fields_read_as_empty() {
        let record = LicenseRecord::from_row(
            &row(&[("Status", "ACTIVE")]),
            &LicensingColumns::default(),
        );

        assert_eq!(record.status, "ACTIVE");
        assert_eq!(record.license_number, "");
        assert_eq!(record.physical_address, "");
    }

    #[test]
    fn test_survey_records_keep_position() {
        let columns = SurveyColumns {
            license: "License #".to_string(),
            address: "Address".to_string(),
            dispensary: "Dispensary".to_string(),
            external_id: "Hoodie ID".to_string(),
        };
        let rows = vec![
            row(&[("Dispensary", "A"), ("License #", "050-1")]),
            row(&[("Dispensary", "B"), ("Address", "2 Oak St")]),
        ];

        let records = SurveyRecord::from_rows(&rows, &columns);

        assert_eq!(records[0].position, 0);
        assert_eq!(records[0].raw_license, "050-1");
        assert_eq!(records[0].raw_address, "");
        assert_eq!(records[1].position, 1);
        assert_eq!(records[1].dispensary_name, "B");
    }
}
