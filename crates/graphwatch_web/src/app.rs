/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::flash::{FlashKind, FlashStore};
use crate::handlers;
use anyhow::{Context, Result};
use axum::{
    middleware::{from_fn, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use graphwatch_core::config::{ActionSettings, DashboardConfig};
use graphwatch_core::harvest::HarvestSettings;
use graphwatch_core::jobs::{JobRegistry, WorkerGuard};
use graphwatch_core::pacing::Clock;
use graphwatch_core::remote::{RemoteConnector, RemoteGraph};
use graphwatch_core::remote_metrics::RemoteMetrics;
use graphwatch_core::session_db::{SessionDb, StoredSession, SESSION_COOKIE};
use graphwatch_core::snapshot_db::SnapshotDb;
use graphwatch_core::{GraphError, RemoteError};
use http::{header, HeaderMap, HeaderValue};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

static REQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct AppState {
    pub snapshots: SnapshotDb,
    pub sessions: SessionDb,
    pub links_db: PathBuf,
    pub connector: Arc<dyn RemoteConnector>,
    pub clock: Arc<dyn Clock>,
    pub jobs: JobRegistry,
    pub metrics: Arc<RemoteMetrics>,
    pub flashes: FlashStore,
    pub actions: ActionSettings,
    pub harvest: HarvestSettings,
}

impl AppState {
    pub fn new(
        cfg: &DashboardConfig,
        connector: Arc<dyn RemoteConnector>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RemoteMetrics>,
    ) -> Result<Self> {
        let data_dir = cfg.data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("create data dir: {}", data_dir.display()))?;
        let db_path = cfg.snapshot_db_path()?;
        let snapshots = SnapshotDb::open(&db_path)?;
        let sessions = SessionDb::open(&db_path, cfg.session_ttl())?;
        Ok(Self {
            snapshots,
            sessions,
            links_db: cfg.links_db_path()?,
            connector,
            clock,
            jobs: JobRegistry::new(),
            metrics,
            flashes: FlashStore::default(),
            actions: cfg.action_settings(),
            harvest: cfg.harvest_settings(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/dashboard", get(handlers::dashboard))
        .route("/run_automation", post(handlers::run_automation))
        .route("/jobs/harvest", get(handlers::harvest_status))
        .route("/links", post(handlers::add_links))
        .route("/check_status", post(handlers::check_status))
        .route("/check_multi_account_status", post(handlers::check_multi_account_status))
        .route("/export_latest", post(handlers::export_latest))
        .route("/unfollow_non_followers", post(handlers::unfollow_non_followers))
        .route("/follow_users", post(handlers::follow_users))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("req");
                info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id
                )
            }),
        )
        .layer(from_fn(ensure_request_id))
        .with_state(state)
}

async fn ensure_request_id(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    if req.headers().get("x-request-id").is_none() {
        let id = format!("req-{}", REQ_ID.fetch_add(1, Ordering::Relaxed));
        req.headers_mut().insert(
            "x-request-id",
            HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("req")),
        );
    }
    next.run(req).await
}

pub async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub fn session_cookie_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|kv| kv.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .find(|t| !t.is_empty())
}

pub fn set_session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

pub async fn current_session(state: &AppState, headers: &HeaderMap) -> Result<Option<StoredSession>> {
    let Some(token) = session_cookie_token(headers) else {
        return Ok(None);
    };
    let sessions = state.sessions.clone();
    blocking(move || sessions.get_live(&token)).await
}

/// Drop the session and send the browser back to the login page.
pub async fn end_session(state: &AppState, token: &str) -> Response {
    state.flashes.clear(token);
    let sessions = state.sessions.clone();
    let owned = token.to_string();
    if let Err(e) = blocking(move || sessions.delete(&owned)).await {
        error!("delete session failed: {e:#}");
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

pub fn to_dashboard() -> Response {
    Redirect::to("/dashboard").into_response()
}

/// Session for the request, or the response to send instead.
pub async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<StoredSession, Response> {
    match current_session(state, headers).await {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(Redirect::to("/").into_response()),
        Err(e) => {
            error!("session lookup failed: {e:#}");
            Err(Redirect::to("/").into_response())
        }
    }
}

/// Live remote client for the session. Resumption is revalidated on every
/// remote-affecting request; a rejected session logs the user out.
pub async fn require_client(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(StoredSession, Arc<dyn RemoteGraph>), Response> {
    let session = require_session(state, headers).await?;
    match state.connector.resume(&session.state).await {
        Ok(client) => Ok((session, client)),
        Err(RemoteError::Auth(msg)) => {
            warn!(owner = %session.state.handle, "session expired: {msg}");
            Err(end_session(state, &session.token).await)
        }
        Err(e) => {
            warn!(owner = %session.state.handle, "session check failed: {e}");
            state.flashes.push(
                &session.token,
                FlashKind::Error,
                format!("Could not reach the remote service: {e}"),
            );
            Err(to_dashboard())
        }
    }
}

/// Exclusive use of the owner's remote session for one action batch.
/// Refused while a harvest or another batch is running for the same owner.
pub fn claim_worker(state: &AppState, session: &StoredSession) -> Result<WorkerGuard, Response> {
    match state.jobs.try_worker(&session.state.handle) {
        Some(guard) => Ok(guard),
        None => {
            info!(owner = %session.state.handle, "session busy, request refused");
            state.flashes.push(&session.token, FlashKind::Warning, SESSION_BUSY);
            Err(to_dashboard())
        }
    }
}

pub const SESSION_BUSY: &str = "Another task is already running for this account. Try again when it finishes.";

/// Report a failed operation. Auth failures end the session.
pub async fn graph_failure(state: &AppState, session: &StoredSession, err: GraphError) -> Response {
    if err.is_auth() {
        info!(owner = %session.state.handle, "session rejected by remote service: {err}");
        return end_session(state, &session.token).await;
    }
    warn!(owner = %session.state.handle, "request failed: {err}");
    let kind = match err {
        GraphError::InvalidInput(_) => FlashKind::Warning,
        _ => FlashKind::Error,
    };
    state.flashes.push(&session.token, kind, err.to_string());
    to_dashboard()
}
