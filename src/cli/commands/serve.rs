//! HTTP API server for integration with other systems.
//!
//! Lets a host application start lecture runs and poll their status and chunks.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::PipelineOrchestrator;
use crate::store::{Chunk, ChunkSink, ProcessingStatus, StatusReporter};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    orchestrator: Arc<PipelineOrchestrator>,
    active: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Mark `owner_id` as running; false if a run is already active in this process.
    fn claim(&self, owner_id: &str) -> bool {
        match self.active.lock() {
            Ok(mut active) => active.insert(owner_id.to_string()),
            Err(_) => false,
        }
    }

    fn release(&self, owner_id: &str) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(owner_id);
        }
    }
}

/// Claim on an owner held by a background run; released on drop, even if the run
/// panics.
struct ActiveRun {
    state: Arc<AppState>,
    owner_id: String,
}

impl ActiveRun {
    fn claim(state: &Arc<AppState>, owner_id: &str) -> Option<Self> {
        state.claim(owner_id).then(|| Self {
            state: state.clone(),
            owner_id: owner_id.to_string(),
        })
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.state.release(&self.owner_id);
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/lectures", post(start_lecture))
        .route("/lectures/{owner_id}/status", get(lecture_status))
        .route("/lectures/{owner_id}/chunks", get(lecture_chunks))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check_ingest(&settings) {
        Output::warning(&format!("{} (runs will fail until this is fixed)", e));
    }

    let state = Arc::new(AppState::new(PipelineOrchestrator::new(settings)?));
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lectern API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Start run", "POST /lectures");
    Output::kv("Status", "GET  /lectures/{owner_id}/status");
    Output::kv("Chunks", "GET  /lectures/{owner_id}/chunks");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct StartRequest {
    owner_id: String,
    video_url: String,
    /// Start even if the lecture is already done
    #[serde(default)]
    force: bool,
}

#[derive(Serialize, Deserialize)]
struct StartResponse {
    owner_id: String,
    status: ProcessingStatus,
}

#[derive(Serialize, Deserialize)]
struct StatusResponse {
    owner_id: String,
    status: ProcessingStatus,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
struct ChunksResponse {
    owner_id: String,
    status: ProcessingStatus,
    chunks: Vec<Chunk>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(code: StatusCode, error: String) -> axum::response::Response {
    (code, Json(ErrorResponse { error })).into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn start_lecture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> impl IntoResponse {
    let owner_id = req.owner_id.trim().to_string();
    if owner_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "owner_id is required".to_string());
    }

    let current = match state.orchestrator.reporter().status(&owner_id).await {
        Ok(status) => status,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if !current.allows_new_run(req.force) {
        return error_response(
            StatusCode::CONFLICT,
            format!("'{}' is {}; pass force to process it again", owner_id, current),
        );
    }
    let Some(claim) = ActiveRun::claim(&state, &owner_id) else {
        return error_response(
            StatusCode::CONFLICT,
            format!("a run for '{}' is already in progress", owner_id),
        );
    };

    info!("Starting run for {}", owner_id);
    tokio::spawn(async move {
        let orchestrator = claim.state.orchestrator.clone();
        if let Err(e) = orchestrator.run(&claim.owner_id, &req.video_url).await {
            warn!("Run for {} failed: {}", claim.owner_id, e);
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(StartResponse {
            owner_id,
            status: ProcessingStatus::NotStarted,
        }),
    )
        .into_response()
}

async fn lecture_status(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.reporter().status_record(&owner_id).await {
        Ok(record) => Json(StatusResponse {
            status: record
                .as_ref()
                .map(|r| r.status)
                .unwrap_or(ProcessingStatus::NotStarted),
            updated_at: record.map(|r| r.updated_at),
            owner_id,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn lecture_chunks(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> impl IntoResponse {
    let status = match state.orchestrator.reporter().status(&owner_id).await {
        Ok(status) => status,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match state.orchestrator.sink().chunks(&owner_id).await {
        Ok(chunks) => Json(ChunksResponse {
            owner_id,
            status,
            chunks,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
