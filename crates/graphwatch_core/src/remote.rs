/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::RemoteError;
use async_trait::async_trait;
use graphwatch_protocol::Identity;
use std::sync::Arc;

/// Resumable login material returned by the remote service.
/// Kept server-side only; never sent to the browser.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionState {
    pub handle: String,
    pub user_id: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn authenticate(&self, handle: &str, secret: &str) -> Result<SessionState, RemoteError>;

    /// Rebuild a live client from stored state. Fails with `Auth` when the
    /// remote side no longer accepts it.
    async fn resume(&self, state: &SessionState) -> Result<Arc<dyn RemoteGraph>, RemoteError>;
}

/// Authenticated view of the remote relationship graph. Not safe for
/// concurrent use: callers drive it from one worker at a time.
#[async_trait]
pub trait RemoteGraph: Send + Sync {
    /// Id of the logged-in account.
    fn self_id(&self) -> &str;
    async fn resolve_id(&self, handle: &str) -> Result<String, RemoteError>;
    async fn list_followers(&self, id: &str) -> Result<Vec<Identity>, RemoteError>;
    async fn list_following(&self, id: &str) -> Result<Vec<Identity>, RemoteError>;
    async fn follow(&self, id: &str) -> Result<(), RemoteError>;
    async fn unfollow(&self, id: &str) -> Result<(), RemoteError>;
}
