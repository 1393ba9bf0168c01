// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispensary_match::{
    insert_run, list_runs, read_csv_file, run_matching, setup_database, verify_count,
    write_master_csv, write_report_json, MatchRun, MatcherConfig,
};

#[derive(Parser, Debug)]
#[command(name = "dispensary-match")]
#[command(about = "Link survey dispensaries to OLCC licenses and export a verified master list")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match a survey export against the OLCC licensing export
    Run {
        /// Survey CSV (Hoodie export)
        #[arg(long, short = 's')]
        survey: PathBuf,

        /// OLCC licensing CSV
        #[arg(long, short = 'l')]
        licensing: PathBuf,

        /// Master list output path
        #[arg(long, short = 'o', default_value = "dispensary_survey_master.csv")]
        output: PathBuf,

        /// Also record the run in this SQLite database
        #[arg(long, env = "DISPENSARY_MATCH_DB")]
        db: Option<PathBuf>,

        /// Matcher config (JSON); built-in defaults otherwise
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Also write the full report (rows + statistics) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List recorded runs, newest first
    Runs {
        #[arg(long, env = "DISPENSARY_MATCH_DB")]
        db: PathBuf,
    },

    /// Browse a recorded run in the terminal UI
    Review {
        #[arg(long, env = "DISPENSARY_MATCH_DB")]
        db: PathBuf,

        /// Run ID (latest run when omitted)
        #[arg(long)]
        run: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispensary_match=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            survey,
            licensing,
            output,
            db,
            config,
            json,
        } => run_match(&survey, &licensing, &output, db.as_deref(), config.as_deref(), json.as_deref()),
        Command::Runs { db } => run_list(&db),
        Command::Review { db, run } => run_ui_mode(&db, run.as_deref()),
    }
}

fn run_match(
    survey_path: &Path,
    licensing_path: &Path,
    output: &Path,
    db_path: Option<&Path>,
    config_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => MatcherConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MatcherConfig::default(),
    };

    // 1. Load both exports
    let survey = read_csv_file(survey_path)
        .with_context(|| format!("Failed to read survey: {}", survey_path.display()))?;
    let licensing = read_csv_file(licensing_path)
        .with_context(|| format!("Failed to read licensing: {}", licensing_path.display()))?;
    info!(headers = ?survey.headers, "survey headers");
    info!(headers = ?licensing.headers, "licensing headers");

    // 2. Match + score
    let report = run_matching(&survey, &licensing, &config)?;

    // 3. Export
    write_master_csv(output, &report.rows)?;
    println!("Exported to: {}", output.display());

    if let Some(path) = json_path {
        write_report_json(path, &report)?;
        println!("Report written to: {}", path.display());
    }

    println!();
    print!("{}", report.summary.render());

    // 4. Optionally record the run
    if let Some(path) = db_path {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        setup_database(&conn)?;

        let run = MatchRun::new(
            &survey_path.display().to_string(),
            &licensing_path.display().to_string(),
            report,
        );
        let inserted = insert_run(&conn, &run)?;
        println!();
        println!("Run {} recorded ({} rows, {} total in store)", run.run_id, inserted, verify_count(&conn)?);
    }

    Ok(())
}

fn run_list(db_path: &Path) -> Result<()> {
    let conn = open_existing(db_path)?;
    let runs = list_runs(&conn)?;

    if runs.is_empty() {
        println!("No runs recorded in {}", db_path.display());
        return Ok(());
    }

    println!(
        "{:<36}  {:<25}  {:>6}  {:>8}  {:>8}",
        "RUN", "STARTED", "TOTAL", "VERIFIED", "WEIGHTED"
    );
    for run in runs {
        println!(
            "{:<36}  {:<25}  {:>6}  {:>7.1}%  {:>7.1}%",
            run.run_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.total,
            run.verification_rate * 100.0,
            run.weighted_verification_rate * 100.0
        );
    }

    Ok(())
}

fn open_existing(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {} (record a run first with `dispensary-match run --db ...`)",
            db_path.display()
        );
    }
    Connection::open(db_path).with_context(|| format!("Failed to open database: {}", db_path.display()))
}

#[cfg(feature = "tui")]
fn run_ui_mode(db_path: &Path, run_id: Option<&str>) -> Result<()> {
    use dispensary_match::{get_latest_run, get_run, get_run_records};

    let conn = open_existing(db_path)?;

    let run = match run_id {
        Some(id) => get_run(&conn, id)?,
        None => get_latest_run(&conn)?,
    };
    let run = match run {
        Some(run) => run,
        None => anyhow::bail!("No matching run in {}", db_path.display()),
    };

    let records = get_run_records(&conn, &run.run_id)?;
    info!(run_id = %run.run_id, records = records.len(), "loaded run for review");

    let label = format!(
        "Run {} · {}",
        &run.run_id[..8.min(run.run_id.len())],
        run.started_at.format("%Y-%m-%d %H:%M")
    );
    let mut app = ui::App::new(label, records);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_db_path: &Path, _run_id: Option<&str>) -> Result<()> {
    anyhow::bail!(
        "TUI mode not available. Rebuild with `--features tui`, or use the API: \
         cargo run --bin match-server --features server"
    )
}
