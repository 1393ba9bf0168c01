// Dispensary Match - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod normalize;      // License / address normalization
pub mod config;         // Matcher configuration (JSON)
pub mod columns;        // Survey header discovery
pub mod records;        // Licensing + survey records
pub mod index;          // License / address / street-prefix indexes
pub mod confidence;     // Tier → label + weight
pub mod matcher;        // License pass, then address pass
pub mod report;         // Master list + statistics
pub mod loader;         // CSV decoding
pub mod export;         // CSV / JSON output
pub mod pipeline;       // Tables → MasterReport
pub mod db;             // Run history (SQLite)

// Re-export commonly used types
pub use error::{MatchError, Result};
pub use normalize::{extract_street_prefix, normalize_address, normalize_license};
pub use config::{LicenseFilter, LicensingColumns, MatcherConfig, SurveyHeaders};
pub use columns::SurveyColumns;
pub use records::{filter_active_retailers, LicenseRecord, Row, SurveyRecord};
pub use index::{IndexStats, LicenseIndex};
pub use confidence::{is_verified, Confidence};
pub use matcher::{match_all, match_by_address, match_by_license, MatchResult, MatchType, MatchedRecord};
pub use report::{build_master_list, ExportRow, MasterReport, MatchSummary};
pub use loader::{read_csv_file, CsvTable};
pub use export::{write_master_csv, write_report_json};
pub use pipeline::run_matching;
pub use db::{
    MatchRun, RunInfo, Event,
    setup_database, insert_run, insert_event, list_runs, get_latest_run, get_run,
    get_run_summary, get_run_records, get_run_records_by_match_type,
    get_events_for_entity, verify_count,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
