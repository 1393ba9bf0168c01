// Dispensary Match - Run History API
// Read-only REST API with Axum over the SQLite run store

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use dispensary_match::{
    get_latest_run, get_run, get_run_records, get_run_records_by_match_type, get_run_summary,
    list_runs, setup_database, ExportRow, MatchSummary, MatchType, RunInfo,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "match-server")]
#[command(about = "Serve recorded dispensary match runs over HTTP")]
#[command(version)]
struct Args {
    /// Run store written by `dispensary-match run --db`
    #[arg(long, env = "DISPENSARY_MATCH_DB")]
    db: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000", env = "DISPENSARY_MATCH_ADDR")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => {
                error!(error = %m, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn require_run(conn: &Connection, run_id: &str) -> Result<RunInfo, ApiError> {
    get_run(conn, run_id)?.ok_or_else(|| ApiError::NotFound(format!("run not found: {}", run_id)))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/runs - All runs, newest first
async fn get_runs(State(state): State<AppState>) -> ApiResult<Vec<RunInfo>> {
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(list_runs(&conn)?)))
}

/// GET /api/runs/latest - Most recent run
async fn get_latest(State(state): State<AppState>) -> ApiResult<RunInfo> {
    let conn = state.conn()?;
    let run = get_latest_run(&conn)?.ok_or_else(|| ApiError::NotFound("no runs recorded".to_string()))?;
    Ok(Json(ApiResponse::ok(run)))
}

/// GET /api/runs/:id/records - Master list of a run
async fn get_records(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Vec<ExportRow>> {
    let conn = state.conn()?;
    require_run(&conn, &run_id)?;
    Ok(Json(ApiResponse::ok(get_run_records(&conn, &run_id)?)))
}

/// GET /api/runs/:id/records/:match_type - Master list filtered by tier
async fn get_records_by_match_type(
    State(state): State<AppState>,
    Path((run_id, match_type)): Path<(String, String)>,
) -> ApiResult<Vec<ExportRow>> {
    // Path has already percent-decoded the segment
    let match_type = MatchType::parse(&match_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown match type: {}", match_type)))?;

    let conn = state.conn()?;
    require_run(&conn, &run_id)?;
    Ok(Json(ApiResponse::ok(get_run_records_by_match_type(&conn, &run_id, match_type)?)))
}

/// GET /api/runs/:id/summary - Verification statistics of a run
async fn get_summary(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<MatchSummary> {
    let conn = state.conn()?;
    let summary = get_run_summary(&conn, &run_id)?
        .ok_or_else(|| ApiError::NotFound(format!("run not found: {}", run_id)))?;
    Ok(Json(ApiResponse::ok(summary)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/runs", get(get_runs))
        .route("/runs/latest", get(get_latest))
        .route("/runs/:id/records", get(get_records))
        .route("/runs/:id/records/:match_type", get(get_records_by_match_type))
        .route("/runs/:id/summary", get(get_summary))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "match_server=info,dispensary_match=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if !args.db.exists() {
        anyhow::bail!(
            "Database not found at {} (record a run first with `dispensary-match run --db ...`)",
            args.db.display()
        );
    }

    let conn = Connection::open(&args.db)
        .with_context(|| format!("Failed to open database: {}", args.db.display()))?;
    setup_database(&conn)?;
    info!(db = %args.db.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    info!(addr = %args.addr, "server running, try /api/runs/latest");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
