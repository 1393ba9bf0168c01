// 💾 Export - Write the master list to CSV / the full report to JSON

use crate::report::{ExportRow, MasterReport};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column order of the master list CSV
pub const EXPORT_COLUMNS: [&str; 9] = [
    "Survey_Display_Name",
    "Hoodie_ID",
    "Hoodie_License",
    "Verified_License",
    "OLCC_Business_Name",
    "Match_Type",
    "Verification_Notes",
    "Confidence_Score",
    "Is_Verified",
];

/// Write rows to any writer as CSV, header first
pub fn write_master<W: Write>(writer: W, rows: &[ExportRow]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    // Explicit header so an empty run still produces a well-formed file
    csv_writer.write_record(EXPORT_COLUMNS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_master_csv(path: &Path, rows: &[ExportRow]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    write_master(file, rows)
        .with_context(|| format!("Failed to write master list: {}", path.display()))
}

pub fn write_report_json(path: &Path, report: &MasterReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report).context("Failed to serialize report")?;
    Ok(())
}
