/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::RemoteError;
use crate::remote::{RemoteConnector, RemoteGraph, SessionState};
use async_trait::async_trait;
use graphwatch_protocol::Identity;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-process remote graph for tests and offline demos.
/// Every call is appended to a log as `op:arg`.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<String, Identity>,
    secrets: HashMap<String, String>,
    followers: HashMap<String, BTreeSet<String>>,
    following: HashMap<String, BTreeSet<String>>,
    failures: HashMap<String, RemoteError>,
    revoked: HashSet<String>,
    calls: Vec<String>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_user(&self, user: Identity) {
        self.lock().users.insert(user.id.clone(), user);
    }

    /// Register a user that can log in with `secret`.
    pub fn add_account(&self, user: Identity, secret: &str) {
        let mut g = self.lock();
        g.secrets.insert(user.handle.clone(), secret.to_string());
        g.users.insert(user.id.clone(), user);
    }

    /// `follower_id` follows `target_id`.
    pub fn link(&self, follower_id: &str, target_id: &str) {
        let mut g = self.lock();
        g.following
            .entry(follower_id.to_string())
            .or_default()
            .insert(target_id.to_string());
        g.followers
            .entry(target_id.to_string())
            .or_default()
            .insert(follower_id.to_string());
    }

    /// Make the next and all later `op` calls on `arg` fail, e.g. `("unfollow", "u2")`.
    pub fn fail(&self, op: &str, arg: &str, err: RemoteError) {
        self.lock().failures.insert(format!("{op}:{arg}"), err);
    }

    pub fn clear_failure(&self, op: &str, arg: &str) {
        self.lock().failures.remove(&format!("{op}:{arg}"));
    }

    /// Invalidate every session of `handle`.
    pub fn revoke(&self, handle: &str) {
        self.lock().revoked.insert(handle.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<String> {
        let prefix = format!("{op}:");
        self.lock()
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn is_following(&self, follower_id: &str, target_id: &str) -> bool {
        self.lock()
            .following
            .get(follower_id)
            .map(|s| s.contains(target_id))
            .unwrap_or(false)
    }

    fn record(&self, op: &str, arg: &str) -> Result<(), RemoteError> {
        let key = format!("{op}:{arg}");
        let mut g = self.lock();
        g.calls.push(key.clone());
        match g.failures.get(&key) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn identities(&self, ids: Option<&BTreeSet<String>>) -> Vec<Identity> {
        let g = self.lock();
        ids.map(|set| {
            set.iter()
                .map(|id| {
                    g.users
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| Identity::new(id.clone(), id.clone(), ""))
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteConnector for MemoryRemote {
    async fn authenticate(&self, handle: &str, secret: &str) -> Result<SessionState, RemoteError> {
        self.record("login", handle)?;
        let mut g = self.lock();
        if g.secrets.get(handle).map(String::as_str) != Some(secret) {
            return Err(RemoteError::Auth(format!("bad credentials for {handle}")));
        }
        g.revoked.remove(handle);
        let user_id = g
            .users
            .values()
            .find(|u| u.handle == handle)
            .map(|u| u.id.clone())
            .ok_or_else(|| RemoteError::NotFound(handle.to_string()))?;
        Ok(SessionState {
            handle: handle.to_string(),
            user_id,
            settings: serde_json::json!({ "token": format!("mem-{handle}") }),
        })
    }

    async fn resume(&self, state: &SessionState) -> Result<Arc<dyn RemoteGraph>, RemoteError> {
        self.record("resume", &state.handle)?;
        if self.lock().revoked.contains(&state.handle) {
            return Err(RemoteError::Auth(format!("session of {} expired", state.handle)));
        }
        Ok(Arc::new(MemoryGraph {
            remote: self.clone(),
            handle: state.handle.clone(),
            user_id: state.user_id.clone(),
        }))
    }
}

pub struct MemoryGraph {
    remote: MemoryRemote,
    handle: String,
    user_id: String,
}

impl MemoryGraph {
    fn check_session(&self) -> Result<(), RemoteError> {
        if self.remote.lock().revoked.contains(&self.handle) {
            return Err(RemoteError::Auth(format!("session of {} expired", self.handle)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGraph for MemoryGraph {
    fn self_id(&self) -> &str {
        &self.user_id
    }

    async fn resolve_id(&self, handle: &str) -> Result<String, RemoteError> {
        self.remote.record("resolve", handle)?;
        self.check_session()?;
        self.remote
            .lock()
            .users
            .values()
            .find(|u| u.handle == handle)
            .map(|u| u.id.clone())
            .ok_or_else(|| RemoteError::NotFound(format!("user {handle}")))
    }

    async fn list_followers(&self, id: &str) -> Result<Vec<Identity>, RemoteError> {
        self.remote.record("followers", id)?;
        self.check_session()?;
        let ids = self.remote.lock().followers.get(id).cloned();
        Ok(self.remote.identities(ids.as_ref()))
    }

    async fn list_following(&self, id: &str) -> Result<Vec<Identity>, RemoteError> {
        self.remote.record("following", id)?;
        self.check_session()?;
        let ids = self.remote.lock().following.get(id).cloned();
        Ok(self.remote.identities(ids.as_ref()))
    }

    async fn follow(&self, id: &str) -> Result<(), RemoteError> {
        self.remote.record("follow", id)?;
        self.check_session()?;
        if !self.remote.lock().users.contains_key(id) {
            return Err(RemoteError::NotFound(format!("user {id}")));
        }
        self.remote.link(&self.user_id, id);
        Ok(())
    }

    async fn unfollow(&self, id: &str) -> Result<(), RemoteError> {
        self.remote.record("unfollow", id)?;
        self.check_session()?;
        let mut g = self.remote.lock();
        let removed = g
            .following
            .get_mut(&self.user_id)
            .map(|s| s.remove(id))
            .unwrap_or(false);
        if !removed {
            return Err(RemoteError::NotFound(format!("{id} is not followed")));
        }
        if let Some(s) = g.followers.get_mut(id) {
            s.remove(&self.user_id);
        }
        Ok(())
    }
}
