use crate::confidence::Confidence;
use crate::matcher::MatchType;
use crate::report::{yes_no, ExportRow, MasterReport, MatchSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// One execution of the matcher against a survey / licensing pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRun {
    /// Stable identity (UUID)
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub survey_file: String,
    pub licensing_file: String,
    pub report: MasterReport,
}

impl MatchRun {
    pub fn new(survey_file: &str, licensing_file: &str, report: MasterReport) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            survey_file: survey_file.to_string(),
            licensing_file: licensing_file.to_string(),
            report,
        }
    }
}

/// Run header as listed by `list_runs` (no rows)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub survey_file: String,
    pub licensing_file: String,
    pub total: i64,
    pub verified: i64,
    pub verification_rate: f64,
    pub weighted_verification_rate: f64,
}

/// Compute idempotency hash for a stored master list row.
/// Identity = run_id + position in the master list + every exported column,
/// so two survey records that export identically still get one row each.
pub fn compute_idempotency_hash(run_id: &str, row_order: usize, row: &ExportRow) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        run_id,
        row_order,
        row.survey_display_name,
        row.hoodie_id,
        row.hoodie_license,
        row.verified_license,
        row.olcc_business_name,
        row.match_type,
        row.verification_notes,
        row.confidence_score,
        yes_no::as_str(row.is_verified)
    ));
    format!("{:x}", hasher.finalize())
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Runs Table (summary kept as JSON)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS match_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            survey_file TEXT NOT NULL,
            licensing_file TEXT NOT NULL,
            total INTEGER NOT NULL,
            verified INTEGER NOT NULL,
            verification_rate REAL NOT NULL,
            weighted_verification_rate REAL NOT NULL,
            summary TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Master Records Table (one row per exported survey record)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS master_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            run_id TEXT NOT NULL,
            row_order INTEGER NOT NULL,
            survey_display_name TEXT NOT NULL,
            hoodie_id TEXT NOT NULL,
            hoodie_license TEXT NOT NULL,
            verified_license TEXT NOT NULL,
            olcc_business_name TEXT NOT NULL,
            match_type TEXT NOT NULL,
            verification_notes TEXT NOT NULL,
            confidence_score TEXT NOT NULL,
            is_verified TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_run ON master_records(run_id, row_order)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_match_type ON master_records(run_id, match_type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runs_started ON match_runs(started_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Persist a run and its master list. Returns the number of rows inserted,
/// which always equals the run's total; storing the same run twice fails.
pub fn insert_run(conn: &Connection, run: &MatchRun) -> Result<usize> {
    let summary = &run.report.summary;
    let summary_json = serde_json::to_string(summary)?;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO match_runs (
            run_id, started_at, survey_file, licensing_file,
            total, verified, verification_rate, weighted_verification_rate, summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            run.run_id,
            run.started_at.to_rfc3339(),
            run.survey_file,
            run.licensing_file,
            summary.total as i64,
            summary.verified as i64,
            summary.verification_rate,
            summary.weighted_verification_rate,
            summary_json,
        ],
    )?;

    let mut inserted = 0;

    for (row_order, row) in run.report.rows.iter().enumerate() {
        let hash = compute_idempotency_hash(&run.run_id, row_order, row);

        tx.execute(
            "INSERT INTO master_records (
                idempotency_hash, run_id, row_order,
                survey_display_name, hoodie_id, hoodie_license, verified_license,
                olcc_business_name, match_type, verification_notes,
                confidence_score, is_verified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                hash,
                run.run_id,
                row_order as i64,
                row.survey_display_name,
                row.hoodie_id,
                row.hoodie_license,
                row.verified_license,
                row.olcc_business_name,
                row.match_type.as_str(),
                row.verification_notes,
                row.confidence_score.as_str(),
                yes_no::as_str(row.is_verified),
            ],
        )?;
        inserted += 1;
    }

    let event = Event::new(
        "run_recorded",
        "match_run",
        &run.run_id,
        serde_json::json!({
            "survey_file": run.survey_file,
            "licensing_file": run.licensing_file,
            "inserted": inserted,
        }),
        "matcher",
    );
    insert_event(&tx, &event)?;

    tx.commit()?;

    info!(run_id = %run.run_id, inserted, "run stored");

    Ok(inserted)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(5, e.to_string()))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

const RUN_COLUMNS: &str = "run_id, started_at, survey_file, licensing_file,
                total, verified, verification_rate, weighted_verification_rate";

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunInfo> {
    let started_at: String = row.get(1)?;

    Ok(RunInfo {
        run_id: row.get(0)?,
        started_at: parse_timestamp(1, &started_at)?,
        survey_file: row.get(2)?,
        licensing_file: row.get(3)?,
        total: row.get(4)?,
        verified: row.get(5)?,
        verification_rate: row.get(6)?,
        weighted_verification_rate: row.get(7)?,
    })
}

/// All runs, newest first
pub fn list_runs(conn: &Connection) -> Result<Vec<RunInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM match_runs ORDER BY started_at DESC, id DESC",
        RUN_COLUMNS
    ))?;

    let runs = stmt
        .query_map([], run_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

pub fn get_latest_run(conn: &Connection) -> Result<Option<RunInfo>> {
    let run = conn
        .query_row(
            &format!(
                "SELECT {} FROM match_runs ORDER BY started_at DESC, id DESC LIMIT 1",
                RUN_COLUMNS
            ),
            [],
            run_from_row,
        )
        .optional()?;

    Ok(run)
}

pub fn get_run(conn: &Connection, run_id: &str) -> Result<Option<RunInfo>> {
    let run = conn
        .query_row(
            &format!("SELECT {} FROM match_runs WHERE run_id = ?1", RUN_COLUMNS),
            [run_id],
            run_from_row,
        )
        .optional()?;

    Ok(run)
}

/// Full statistics stored with a run
pub fn get_run_summary(conn: &Connection, run_id: &str) -> Result<Option<MatchSummary>> {
    let summary_json: Option<String> = conn
        .query_row(
            "SELECT summary FROM match_runs WHERE run_id = ?1",
            [run_id],
            |row| row.get(0),
        )
        .optional()?;

    match summary_json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

const RECORD_COLUMNS: &str = "survey_display_name, hoodie_id, hoodie_license, verified_license,
                olcc_business_name, match_type, verification_notes,
                confidence_score, is_verified";

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExportRow> {
    let match_type: String = row.get(5)?;
    let confidence: String = row.get(7)?;
    let verified: String = row.get(8)?;

    Ok(ExportRow {
        survey_display_name: row.get(0)?,
        hoodie_id: row.get(1)?,
        hoodie_license: row.get(2)?,
        verified_license: row.get(3)?,
        olcc_business_name: row.get(4)?,
        match_type: MatchType::parse(&match_type)
            .ok_or_else(|| conversion_error(5, format!("unknown match type: {}", match_type)))?,
        verification_notes: row.get(6)?,
        confidence_score: Confidence::parse(&confidence)
            .ok_or_else(|| conversion_error(7, format!("unknown confidence: {}", confidence)))?,
        is_verified: yes_no::parse(&verified)
            .ok_or_else(|| conversion_error(8, format!("invalid Is_Verified: {}", verified)))?,
    })
}

/// Master list of a run, in export order
pub fn get_run_records(conn: &Connection, run_id: &str) -> Result<Vec<ExportRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM master_records WHERE run_id = ?1 ORDER BY row_order",
        RECORD_COLUMNS
    ))?;

    let records = stmt
        .query_map([run_id], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_run_records_by_match_type(
    conn: &Connection,
    run_id: &str,
    match_type: MatchType,
) -> Result<Vec<ExportRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM master_records WHERE run_id = ?1 AND match_type = ?2 ORDER BY row_order",
        RECORD_COLUMNS
    ))?;

    let records = stmt
        .query_map(params![run_id, match_type.as_str()], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Total master records across all runs
pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM master_records", [], |row| row.get(0))?;

    Ok(count)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e.to_string()))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str, match_type: MatchType) -> ExportRow {
        let verified = match_type != MatchType::NoMatch;
        ExportRow {
            survey_display_name: format!("{} - 1 Main St", name),
            hoodie_id: id.to_string(),
            hoodie_license: "050-1234567".to_string(),
            verified_license: "050-1234567".to_string(),
            olcc_business_name: if verified { format!("{} LLC", name) } else { String::new() },
            match_type,
            verification_notes: "note".to_string(),
            confidence_score: Confidence::for_match(match_type),
            is_verified: verified,
        }
    }

    fn test_run(rows: Vec<ExportRow>) -> MatchRun {
        let summary = MatchSummary::from_rows(&rows);
        MatchRun::new("survey.csv", "olcc.csv", MasterReport { rows, summary })
    }

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_read_back_run() {
        let conn = open();
        let run = test_run(vec![
            row("H1", "Alpha", MatchType::LicenseExact),
            row("H2", "Beta", MatchType::AddressPartial),
            row("H3", "Gamma", MatchType::NoMatch),
        ]);

        let inserted = insert_run(&conn, &run).unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(verify_count(&conn).unwrap(), 3);

        let records = get_run_records(&conn, &run.run_id).unwrap();
        assert_eq!(records, run.report.rows);

        let info = get_run(&conn, &run.run_id).unwrap().unwrap();
        assert_eq!(info.total, 3);
        assert_eq!(info.verified, 2);
        assert_eq!(info.survey_file, "survey.csv");

        let summary = get_run_summary(&conn, &run.run_id).unwrap().unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count_for(MatchType::AddressPartial), 1);
        assert_eq!(summary.count_for_confidence(Confidence::Low), 1);
    }

    #[test]
    fn test_identical_rows_within_run_are_all_stored() {
        let conn = open();
        let run = test_run(vec![
            row("H1", "Alpha", MatchType::NoMatch),
            row("H1", "Alpha", MatchType::NoMatch),
        ]);

        assert_eq!(insert_run(&conn, &run).unwrap(), 2);

        let records = get_run_records(&conn, &run.run_id).unwrap();
        assert_eq!(records.len(), run.report.summary.total);
        assert_eq!(records, run.report.rows);
        assert_eq!(get_run(&conn, &run.run_id).unwrap().unwrap().total, 2);
        assert_eq!(verify_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_storing_same_run_twice_fails() {
        let conn = open();
        let run = test_run(vec![row("H1", "Alpha", MatchType::LicenseExact)]);
        insert_run(&conn, &run).unwrap();

        assert!(insert_run(&conn, &run).is_err());
        assert_eq!(verify_count(&conn).unwrap(), 1);
        assert_eq!(list_runs(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_is_verified_text_rejected() {
        let conn = open();
        let run = test_run(vec![row("H1", "Alpha", MatchType::LicenseExact)]);
        insert_run(&conn, &run).unwrap();
        conn.execute("UPDATE master_records SET is_verified = 'Maybe'", []).unwrap();

        assert!(get_run_records(&conn, &run.run_id).is_err());
    }

    #[test]
    fn test_same_rows_in_separate_runs_are_kept() {
        let conn = open();
        let rows = vec![row("H1", "Alpha", MatchType::LicenseExact)];

        insert_run(&conn, &test_run(rows.clone())).unwrap();
        insert_run(&conn, &test_run(rows)).unwrap();

        assert_eq!(verify_count(&conn).unwrap(), 2);
        assert_eq!(list_runs(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_latest_run_and_missing_run() {
        let conn = open();
        assert!(get_latest_run(&conn).unwrap().is_none());

        let mut first = test_run(vec![row("H1", "Alpha", MatchType::NoMatch)]);
        first.started_at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let second = test_run(vec![row("H2", "Beta", MatchType::AddressName)]);
        insert_run(&conn, &first).unwrap();
        insert_run(&conn, &second).unwrap();

        let latest = get_latest_run(&conn).unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);

        let runs = list_runs(&conn).unwrap();
        assert_eq!(runs[0].run_id, second.run_id);
        assert_eq!(runs[1].run_id, first.run_id);

        assert!(get_run(&conn, "nope").unwrap().is_none());
        assert!(get_run_summary(&conn, "nope").unwrap().is_none());
        assert!(get_run_records(&conn, "nope").unwrap().is_empty());
    }

    #[test]
    fn test_records_by_match_type() {
        let conn = open();
        let run = test_run(vec![
            row("H1", "Alpha", MatchType::LicenseExact),
            row("H2", "Beta", MatchType::NoMatch),
            row("H3", "Gamma", MatchType::NoMatch),
        ]);
        insert_run(&conn, &run).unwrap();

        let unmatched = get_run_records_by_match_type(&conn, &run.run_id, MatchType::NoMatch).unwrap();

        let ids: Vec<&str> = unmatched.iter().map(|r| r.hoodie_id.as_str()).collect();
        assert_eq!(ids, vec!["H2", "H3"]);
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let a = row("H1", "Alpha", MatchType::LicenseExact);

        let hash1 = compute_idempotency_hash("run-1", 0, &a);
        let hash2 = compute_idempotency_hash("run-1", 0, &a);
        let other_run = compute_idempotency_hash("run-2", 0, &a);
        let other_position = compute_idempotency_hash("run-1", 1, &a);

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(hash1, other_run);
        assert_ne!(hash1, other_position);
    }

    #[test]
    fn test_run_event_logged() {
        let conn = open();
        let run = test_run(vec![row("H1", "Alpha", MatchType::LicenseExact)]);
        insert_run(&conn, &run).unwrap();

        let events = get_events_for_entity(&conn, "match_run", &run.run_id).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "run_recorded");
        assert_eq!(events[0].data["inserted"], 1);
    }
}
