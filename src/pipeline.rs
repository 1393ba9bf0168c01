// 🔗 Pipeline - Loaded tables → matched, scored master report
//
//   licensing rows → filter → LicenseIndex
//   survey rows → column discovery → SurveyRecord
//   → license pass → address pass → MasterReport

use crate::columns::SurveyColumns;
use crate::config::MatcherConfig;
use crate::error::Result;
use crate::index::LicenseIndex;
use crate::loader::CsvTable;
use crate::matcher::match_all;
use crate::normalize::normalize_license;
use crate::records::{filter_active_retailers, SurveyRecord};
use crate::report::MasterReport;
use tracing::info;

/// How many `raw -> normalized` license pairs to log per run
pub const LICENSE_SAMPLE_SIZE: usize = 5;

pub fn build_index(licensing: &CsvTable, config: &MatcherConfig) -> LicenseIndex {
    let records = filter_active_retailers(
        &licensing.rows,
        &config.licensing_columns,
        &config.license_filter,
    );

    info!(
        total = licensing.len(),
        active_retailers = records.len(),
        "licensing rows filtered"
    );

    let index = LicenseIndex::build(records);
    let stats = index.stats();
    info!(
        license_keys = stats.license_keys,
        address_keys = stats.address_keys,
        street_keys = stats.street_keys,
        "license index built"
    );

    index
}

/// Resolve survey columns once, then read every row into a SurveyRecord
pub fn read_survey(survey: &CsvTable, config: &MatcherConfig) -> Result<Vec<SurveyRecord>> {
    let columns = SurveyColumns::discover(&survey.headers, &config.survey_headers)?;
    info!(
        license = %columns.license,
        address = %columns.address,
        dispensary = %columns.dispensary,
        external_id = %columns.external_id,
        "survey columns resolved"
    );

    Ok(SurveyRecord::from_rows(&survey.rows, &columns))
}

/// First `n` survey licenses with their normalized form
pub fn license_samples(records: &[SurveyRecord], n: usize) -> Vec<(String, Option<String>)> {
    records
        .iter()
        .take(n)
        .map(|r| (r.raw_license.clone(), normalize_license(Some(&r.raw_license))))
        .collect()
}

/// Run the full match. Fails only if a survey column cannot be found, and
/// does so before any matching starts.
pub fn run_matching(
    survey: &CsvTable,
    licensing: &CsvTable,
    config: &MatcherConfig,
) -> Result<MasterReport> {
    let survey_records = read_survey(survey, config)?;
    let index = build_index(licensing, config);

    for (raw, normalized) in license_samples(&survey_records, LICENSE_SAMPLE_SIZE) {
        info!(
            raw = %raw,
            normalized = normalized.as_deref().unwrap_or("<none>"),
            "license normalization sample"
        );
    }

    let matched = match_all(survey_records, &index);
    Ok(MasterReport::build(&matched))
}
