/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! JSON gateway client for the remote service.
//!
//! Endpoints (relative to `base_url`):
//! `POST /login`, `GET /session`, `GET /users/by_handle/{handle}`,
//! `GET /users/{id}/followers?cursor=`, `GET /users/{id}/following?cursor=`,
//! `POST /users/{id}/follow`, `POST /users/{id}/unfollow`.

use crate::error::RemoteError;
use crate::http_retry::send_idempotent;
use crate::remote::{RemoteConnector, RemoteGraph, SessionState};
use crate::remote_metrics::RemoteMetrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use graphwatch_protocol::Identity;
use reqwest::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use urlencoding::encode;

const READ_ATTEMPTS: u32 = 3;
const MAX_PAGES: usize = 10_000;

#[derive(serde::Serialize)]
struct LoginRequest<'a> {
    handle: &'a str,
    secret: &'a str,
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    user_id: String,
    token: String,
    #[serde(default)]
    settings: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct UserPage {
    #[serde(default)]
    items: Vec<Identity>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    base_url: String,
    metrics: Arc<RemoteMetrics>,
}

impl HttpConnector {
    pub fn new(base_url: &str, timeout: Duration, metrics: Arc<RemoteMetrics>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        })
    }

    fn graph(&self, state: &SessionState) -> Result<HttpRemoteGraph, RemoteError> {
        let token = session_token(state)
            .ok_or_else(|| RemoteError::Auth(format!("no token stored for {}", state.handle)))?;
        Ok(HttpRemoteGraph {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token,
            user_id: state.user_id.clone(),
            metrics: self.metrics.clone(),
        })
    }
}

#[async_trait]
impl RemoteConnector for HttpConnector {
    async fn authenticate(&self, handle: &str, secret: &str) -> Result<SessionState, RemoteError> {
        let url = format!("{}/login", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(&LoginRequest { handle, secret })
            .send()
            .await
            .map_err(|e| self.transport_error("login", e))?;
        let resp = check_status(resp, &format!("login {handle}"))
            .map_err(|e| self.track(e))?;
        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("decode login response: {e}")))?;
        let mut settings = match body.settings {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        settings.insert("token".to_string(), serde_json::Value::String(body.token));
        info!(handle, user_id = %body.user_id, "remote login ok");
        Ok(SessionState {
            handle: handle.to_string(),
            user_id: body.user_id,
            settings: serde_json::Value::Object(settings),
        })
    }

    async fn resume(&self, state: &SessionState) -> Result<Arc<dyn RemoteGraph>, RemoteError> {
        let graph = self.graph(state)?;
        let url = format!("{}/session", self.base_url);
        let resp = send_idempotent(|| graph.authed(graph.http.get(&url)), READ_ATTEMPTS, &self.metrics)
            .await
            .map_err(|e| self.transport_error("session check", e))?;
        check_status(resp, &format!("session of {}", state.handle)).map_err(|e| self.track(e))?;
        Ok(Arc::new(graph))
    }
}

impl HttpConnector {
    fn transport_error(&self, what: &str, e: reqwest::Error) -> RemoteError {
        self.track(RemoteError::Transient(format!("{what}: {e}")))
    }

    fn track(&self, e: RemoteError) -> RemoteError {
        self.metrics.record_error(&e);
        e
    }
}

pub struct HttpRemoteGraph {
    http: reqwest::Client,
    base_url: String,
    token: String,
    user_id: String,
    metrics: Arc<RemoteMetrics>,
}

impl HttpRemoteGraph {
    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.token).header("Accept", "application/json")
    }

    fn track(&self, e: RemoteError) -> RemoteError {
        self.metrics.record_error(&e);
        e
    }

    async fn get(&self, url: &str, what: &str) -> Result<Response, RemoteError> {
        let resp = send_idempotent(|| self.authed(self.http.get(url)), READ_ATTEMPTS, &self.metrics)
            .await
            .map_err(|e| self.track(RemoteError::Transient(format!("{what}: {e}"))))?;
        check_status(resp, what).map_err(|e| self.track(e))
    }

    async fn post(&self, url: &str, what: &str) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.post(url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.metrics.http_timeout();
                } else {
                    self.metrics.http_error();
                }
                self.track(RemoteError::Transient(format!("{what}: {e}")))
            })?;
        check_status(resp, what).map_err(|e| self.track(e))?;
        Ok(())
    }

    async fn list_all(&self, id: &str, kind: &str) -> Result<Vec<Identity>, RemoteError> {
        let base = format!("{}/users/{}/{kind}", self.base_url, encode(id));
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let url = match cursor.as_deref() {
                Some(c) => format!("{base}?cursor={}", encode(c)),
                None => base.clone(),
            };
            let what = format!("list {kind} of {id}");
            let page: UserPage = self
                .get(&url, &what)
                .await?
                .json()
                .await
                .map_err(|e| RemoteError::Transient(format!("{what}: decode page: {e}")))?;
            out.extend(page.items);
            match page.next.filter(|c| !c.trim().is_empty()) {
                Some(next) => cursor = Some(next),
                None => {
                    debug!(id, kind, total = out.len(), "relationship list fetched");
                    return Ok(out);
                }
            }
        }
        Err(RemoteError::Transient(format!(
            "list {kind} of {id}: pagination did not terminate"
        )))
    }
}

#[async_trait]
impl RemoteGraph for HttpRemoteGraph {
    fn self_id(&self) -> &str {
        &self.user_id
    }

    async fn resolve_id(&self, handle: &str) -> Result<String, RemoteError> {
        let url = format!("{}/users/by_handle/{}", self.base_url, encode(handle));
        let user: Identity = self
            .get(&url, &format!("resolve {handle}"))
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("resolve {handle}: decode: {e}")))?;
        Ok(user.id)
    }

    async fn list_followers(&self, id: &str) -> Result<Vec<Identity>, RemoteError> {
        self.list_all(id, "followers").await
    }

    async fn list_following(&self, id: &str) -> Result<Vec<Identity>, RemoteError> {
        self.list_all(id, "following").await
    }

    async fn follow(&self, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/users/{}/follow", self.base_url, encode(id));
        self.post(&url, &format!("follow {id}")).await
    }

    async fn unfollow(&self, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/users/{}/unfollow", self.base_url, encode(id));
        self.post(&url, &format!("unfollow {id}")).await
    }
}

pub fn session_token(state: &SessionState) -> Option<String> {
    state
        .settings
        .get("token")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn check_status(resp: Response, what: &str) -> Result<Response, RemoteError> {
    match classify_status(resp.status(), what) {
        Some(e) => Err(e),
        None => Ok(resp),
    }
}

pub fn classify_status(status: StatusCode, what: &str) -> Option<RemoteError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Auth(format!("{what}: {status}"))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::NotFound(what.to_string()),
        _ => RemoteError::Transient(format!("{what}: {status}")),
    })
}
