/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::app::{
    blocking, claim_worker, current_session, end_session, graph_failure, require_client,
    require_session, set_session_cookie, to_dashboard, AppState, SESSION_BUSY,
};
use crate::flash::FlashKind;
use crate::pages::{self, DashboardView};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use graphwatch_core::actions::{parse_handle_list, ActionExecutor};
use graphwatch_core::diff::SnapshotChanges;
use graphwatch_core::export::{export_filename, snapshot_csv};
use graphwatch_core::harvest::Harvester;
use graphwatch_core::link_queue::SqliteLinkQueue;
use graphwatch_core::pacing::Pacer;
use graphwatch_core::relationship::{check_relationship, cross_check_accounts, RelationshipCache};
use graphwatch_core::{GraphError, RemoteError};
use graphwatch_protocol::{ActionOutcome, ActionResult, RelationshipMode};
use http::{header, HeaderMap, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers).await {
        Ok(Some(_)) => to_dashboard(),
        Ok(None) => Html(pages::login_page(None)).into_response(),
        Err(e) => {
            error!("session lookup failed: {e:#}");
            Html(pages::login_page(None)).into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let handle = form.username.trim().trim_start_matches('@').to_string();
    if handle.is_empty() || form.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::login_page(Some("Please enter both username and password."))),
        )
            .into_response();
    }

    let remote_state = match state.connector.authenticate(&handle, &form.password).await {
        Ok(s) => s,
        Err(e) => {
            warn!(owner = %handle, "login failed: {e}");
            let status = match e {
                RemoteError::Transient(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNAUTHORIZED,
            };
            return (status, Html(pages::login_page(Some(&format!("Login failed: {e}"))))).into_response();
        }
    };

    let sessions = state.sessions.clone();
    match blocking(move || sessions.create(&remote_state)).await {
        Ok(session) => {
            info!(owner = %handle, "logged in");
            state
                .flashes
                .push(&session.token, FlashKind::Success, "Successfully logged in!");
            (
                [(
                    header::SET_COOKIE,
                    set_session_cookie(&session.token, state.sessions.ttl().as_secs()),
                )],
                Redirect::to("/dashboard"),
            )
                .into_response()
        }
        Err(e) => {
            error!(owner = %handle, "store session failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::login_page(Some("Could not start a session."))),
            )
                .into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers).await {
        Ok(Some(session)) => {
            info!(owner = %session.state.handle, "logged out");
            end_session(&state, &session.token).await
        }
        _ => Redirect::to("/").into_response(),
    }
}

pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let owner = session.state.handle.clone();
    let mut flashes = state.flashes.take(&session.token);

    let snapshots = state.snapshots.clone();
    let own_owner = owner.clone();
    let own = blocking(move || {
        let Some(latest) = snapshots.get_latest(&own_owner)? else {
            return Ok(None);
        };
        let previous = snapshots.get_previous(&own_owner, latest.date)?;
        let changes = previous.map(|p| SnapshotChanges::between(&p, &latest));
        Ok(Some((latest.summary(), changes)))
    })
    .await;
    let (own, changes) = match own {
        Ok(Some((summary, changes))) => (Some(summary), changes),
        Ok(None) => (None, None),
        Err(e) => {
            error!(owner = %owner, "read own snapshot failed: {e:#}");
            flashes.push(error_flash(format!("Could not read your snapshot data: {e}")));
            (None, None)
        }
    };

    let snapshots = state.snapshots.clone();
    let others_owner = owner.clone();
    let others = match blocking(move || snapshots.get_latest_for_all_except(&others_owner)).await {
        Ok(list) => list.iter().map(|s| s.summary()).collect(),
        Err(e) => {
            error!("read processed accounts failed: {e:#}");
            flashes.push(error_flash(format!("Could not read processed account data: {e}")));
            Vec::new()
        }
    };

    let view = DashboardView {
        job: state.jobs.status(&owner),
        handle: owner,
        flashes,
        own,
        changes,
        others,
    };
    Html(pages::dashboard_page(&view)).into_response()
}

fn error_flash(text: String) -> crate::flash::Flash {
    crate::flash::Flash {
        kind: FlashKind::Error,
        text,
    }
}

pub async fn run_automation(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, client) = match require_client(&state, &headers).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let owner = session.state.handle.clone();
    let links_db = state.links_db.clone();
    let queue = match tokio::task::spawn_blocking(move || SqliteLinkQueue::open(links_db)).await {
        Ok(Ok(q)) => q,
        Ok(Err(e)) => return graph_failure(&state, &session, e).await,
        Err(e) => {
            error!("open link queue failed: {e}");
            state
                .flashes
                .push(&session.token, FlashKind::Error, "Could not open the link queue.");
            return to_dashboard();
        }
    };
    let harvester = Harvester::new(
        state.snapshots.clone(),
        Arc::new(queue),
        state.clock.clone(),
        state.metrics.clone(),
        state.harvest.clone(),
    );
    match state.jobs.spawn_harvest(&owner, harvester, client) {
        Some(_) => state.flashes.push(
            &session.token,
            FlashKind::Success,
            "Harvest started in the background. Results show up here once data is fetched.",
        ),
        None => state.flashes.push(
            &session.token,
            FlashKind::Warning,
            SESSION_BUSY,
        ),
    }
    to_dashboard()
}

pub async fn harvest_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers).await {
        Ok(Some(session)) => Json(state.jobs.status(&session.state.handle)).into_response(),
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "login required" })),
        )
            .into_response(),
        Err(e) => {
            error!("session lookup failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "session lookup failed").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct LinksForm {
    #[serde(default)]
    links: String,
}

pub async fn add_links(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LinksForm>,
) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let urls: Vec<String> = form
        .links
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        state
            .flashes
            .push(&session.token, FlashKind::Warning, "Please provide at least one link.");
        return to_dashboard();
    }
    let links_db = state.links_db.clone();
    let queue = match tokio::task::spawn_blocking(move || SqliteLinkQueue::open(links_db)).await {
        Ok(Ok(q)) => q,
        Ok(Err(e)) => return graph_failure(&state, &session, e).await,
        Err(e) => {
            error!("open link queue failed: {e}");
            return to_dashboard();
        }
    };
    match queue.add_links(urls).await {
        Ok(n) => {
            info!(owner = %session.state.handle, added = n, "links queued");
            state
                .flashes
                .push(&session.token, FlashKind::Success, format!("Queued {n} link(s)."));
            to_dashboard()
        }
        Err(e) => graph_failure(&state, &session, e).await,
    }
}

#[derive(Deserialize)]
pub struct CheckStatusForm {
    #[serde(default)]
    target_username: String,
    #[serde(default)]
    check_type: String,
}

pub async fn check_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CheckStatusForm>,
) -> Response {
    let (session, client) = match require_client(&state, &headers).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let _worker = match claim_worker(&state, &session) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    let target = form.target_username.trim().trim_start_matches('@').to_string();
    let Some(mode) = RelationshipMode::from_str(&form.check_type) else {
        state
            .flashes
            .push(&session.token, FlashKind::Warning, "Please choose a check type.");
        return to_dashboard();
    };
    let mut cache = RelationshipCache::new();
    let owner_id = client.self_id().to_string();
    match check_relationship(client.as_ref(), &mut cache, &owner_id, &target, mode).await {
        Ok(yes) => {
            let (kind, text) = match (mode, yes) {
                (RelationshipMode::Follower, true) => (FlashKind::Success, format!("Yes, {target} follows you.")),
                (RelationshipMode::Follower, false) => (FlashKind::Info, format!("No, {target} does not follow you.")),
                (RelationshipMode::Following, true) => (FlashKind::Success, format!("Yes, you follow {target}.")),
                (RelationshipMode::Following, false) => (FlashKind::Info, format!("No, you do not follow {target}.")),
            };
            state.flashes.push(&session.token, kind, text);
            to_dashboard()
        }
        Err(GraphError::NotFound { .. }) => {
            state
                .flashes
                .push(&session.token, FlashKind::Error, format!("User '{target}' not found."));
            to_dashboard()
        }
        Err(e) => graph_failure(&state, &session, e).await,
    }
}

#[derive(Deserialize)]
pub struct MultiCheckForm {
    #[serde(default)]
    target_username: String,
    #[serde(default)]
    my_accounts: String,
    #[serde(default)]
    password: String,
}

pub async fn check_multi_account_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<MultiCheckForm>,
) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let accounts: Vec<String> = form.my_accounts.split(',').map(|a| a.trim().to_string()).collect();
    let mut pacer = Pacer::new(state.clock.clone(), state.actions.cross_check_pace);
    match cross_check_accounts(
        state.connector.as_ref(),
        &mut pacer,
        &accounts,
        &form.password,
        &form.target_username,
    )
    .await
    {
        Ok(results) => {
            for r in results {
                let kind = match r.follows {
                    Some(true) => FlashKind::Success,
                    Some(false) => FlashKind::Info,
                    None => FlashKind::Error,
                };
                state.flashes.push(&session.token, kind, r.detail);
            }
            to_dashboard()
        }
        Err(GraphError::InvalidInput(_)) => {
            state.flashes.push(
                &session.token,
                FlashKind::Warning,
                "Please fill all fields for the multi-account check.",
            );
            to_dashboard()
        }
        Err(e) => graph_failure(&state, &session, e).await,
    }
}

pub async fn export_latest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let snapshots = state.snapshots.clone();
    let owner = session.state.handle.clone();
    match blocking(move || snapshots.get_latest(&owner)).await {
        Ok(Some(snap)) => {
            let disposition = format!("attachment; filename=\"{}\"", export_filename(&snap));
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                snapshot_csv(&snap),
            )
                .into_response()
        }
        Ok(None) => {
            state
                .flashes
                .push(&session.token, FlashKind::Warning, "No snapshot found to export.");
            to_dashboard()
        }
        Err(e) => {
            error!(owner = %session.state.handle, "export failed: {e:#}");
            state.flashes.push(
                &session.token,
                FlashKind::Error,
                format!("An error occurred during export: {e}"),
            );
            to_dashboard()
        }
    }
}

#[derive(Deserialize)]
pub struct UnfollowForm {
    #[serde(default)]
    unfollow_count: String,
}

pub async fn unfollow_non_followers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UnfollowForm>,
) -> Response {
    let (session, client) = match require_client(&state, &headers).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let _worker = match claim_worker(&state, &session) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    let limit = match form.unfollow_count.trim().parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        Ok(_) => {
            state.flashes.push(
                &session.token,
                FlashKind::Warning,
                "Please enter a valid number greater than 0.",
            );
            return to_dashboard();
        }
        Err(_) => {
            state
                .flashes
                .push(&session.token, FlashKind::Warning, "Invalid number provided.");
            return to_dashboard();
        }
    };

    let mut executor = ActionExecutor::new(
        Pacer::new(state.clock.clone(), state.actions.pace),
        state.metrics.clone(),
    );
    match executor.unfollow_non_followers(client.as_ref(), limit).await {
        Ok(report) if report.non_followers == 0 => {
            state.flashes.push(
                &session.token,
                FlashKind::Success,
                "Everyone you follow also follows you back.",
            );
            to_dashboard()
        }
        Ok(report) => {
            let done = report.results.iter().filter(|r| r.is_success()).count();
            state.flashes.push(
                &session.token,
                FlashKind::Success,
                format!("Unfollowed {done} of {} non-followers.", report.non_followers),
            );
            push_failures(&state, &session.token, &report.results);
            to_dashboard()
        }
        Err(e) => graph_failure(&state, &session, e).await,
    }
}

#[derive(Deserialize)]
pub struct FollowForm {
    #[serde(default)]
    usernames: String,
}

pub async fn follow_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<FollowForm>,
) -> Response {
    let (session, client) = match require_client(&state, &headers).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let _worker = match claim_worker(&state, &session) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    let handles = parse_handle_list(&form.usernames);
    if handles.is_empty() {
        state.flashes.push(
            &session.token,
            FlashKind::Warning,
            "Please provide a list of usernames to follow.",
        );
        return to_dashboard();
    }
    let mut executor = ActionExecutor::new(
        Pacer::new(state.clock.clone(), state.actions.pace),
        state.metrics.clone(),
    );
    match executor.follow_batch(client.as_ref(), &handles).await {
        Ok(results) => {
            for r in results.iter().filter(|r| r.is_success()) {
                state.flashes.push(&session.token, FlashKind::Success, r.detail.clone());
            }
            push_failures(&state, &session.token, &results);
            to_dashboard()
        }
        Err(e) => graph_failure(&state, &session, e).await,
    }
}

fn push_failures(state: &AppState, token: &str, results: &[ActionResult]) {
    for r in results.iter().filter(|r| !r.is_success()) {
        let kind = match r.outcome {
            ActionOutcome::NotFound => FlashKind::Warning,
            _ => FlashKind::Error,
        };
        state.flashes.push(token, kind, r.detail.clone());
    }
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    let snapshots = state.snapshots.clone();
    match blocking(move || snapshots.health_check()).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            error!("health check failed: {e:#}");
            (StatusCode::SERVICE_UNAVAILABLE, "db unavailable").into_response()
        }
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    Json(state.metrics.snapshot_json()).into_response()
}
