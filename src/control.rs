//! HTTP control surface
//!
//! A thin axum server in front of the use cases:
//! - `GET /`          log viewer, newest entry first
//! - `GET /status`    whether a run is active, plus the last run's outcome
//! - `GET /run`       start a crawl in the background (202) unless one is running (409)
//! - `GET /reconcile` reconciliation report as JSON
//! - `GET /download`  consolidate, then stream `all.zip`

#![allow(clippy::uninlined_format_args)]

pub mod log_viewer;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::application::crawl_use_cases::CrawlUseCases;
use crate::crawling::orchestrator::RunStats;

/// Outcome of the most recent background run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub running: bool,
    pub last_run: Option<LastRun>,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    use_cases: Arc<CrawlUseCases>,
    running: Arc<AtomicBool>,
    last_run: Arc<RwLock<Option<LastRun>>>,
    log_file: PathBuf,
}

impl AppState {
    pub fn new(use_cases: Arc<CrawlUseCases>, log_file: PathBuf) -> Self {
        Self {
            use_cases,
            running: Arc::new(AtomicBool::new(false)),
            last_run: Arc::new(RwLock::new(None)),
            log_file,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag when the background run ends, however it ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(logs))
        .route("/status", get(status))
        .route("/run", get(start_run))
        .route("/reconcile", get(reconcile))
        .route("/download", get(download))
        .with_state(state)
}

/// Serve on an already bound listener until Ctrl-C
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("🚀 Control server listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Control server shutting down");
        })
        .await
        .context("Control server error")?;
    Ok(())
}

pub async fn serve(state: AppState, bind_address: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control server to {}", addr))?;
    serve_on(listener, state).await
}

async fn logs(State(state): State<AppState>) -> Html<String> {
    let content = match tokio::fs::read_to_string(&state.log_file).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read log file {:?}: {}", state.log_file, e);
            String::new()
        }
    };
    Html(log_viewer::render_page(&log_viewer::parse_log(&content)))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.is_running(),
        last_run: state.last_run.read().await.clone(),
    })
}

async fn start_run(State(state): State<AppState>) -> Response {
    if state
        .running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "A scraper run is already in progress"})),
        )
            .into_response();
    }

    let guard = RunningGuard(state.running.clone());
    let use_cases = state.use_cases.clone();
    let last_run = state.last_run.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let outcome = use_cases.run_crawl().await;
        let finished = match outcome {
            Ok(stats) => LastRun {
                finished_at: Utc::now(),
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                error!("❌ Background run failed: {:#}", e);
                LastRun {
                    finished_at: Utc::now(),
                    stats: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        *last_run.write().await = Some(finished);
    });

    (StatusCode::ACCEPTED, Json(json!({"message": "Scraper started"}))).into_response()
}

fn internal_error(context: &str, error: &anyhow::Error) -> Response {
    error!("❌ {}: {:#}", context, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": context, "error": format!("{:#}", error)})),
    )
        .into_response()
}

async fn reconcile(State(state): State<AppState>) -> Response {
    let use_cases = state.use_cases.clone();
    let result = tokio::task::spawn_blocking(move || use_cases.reconcile())
        .await
        .context("Reconcile task panicked")
        .and_then(|result| result);
    match result {
        Ok(report) => Json(report).into_response(),
        Err(e) => internal_error("Reconciliation failed", &e),
    }
}

async fn download(State(state): State<AppState>) -> Response {
    let use_cases = state.use_cases.clone();
    let result = tokio::task::spawn_blocking(move || use_cases.consolidate())
        .await
        .context("Consolidation task panicked")
        .and_then(|result| result);
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => return internal_error("Consolidation failed", &e),
    };

    let file = match tokio::fs::File::open(&summary.archive).await {
        Ok(file) => file,
        Err(e) => return internal_error("Cannot open archive", &e.into()),
    };
    (
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"all.zip\""),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
