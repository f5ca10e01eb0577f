/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::{GraphError, GraphResult, RemoteError};
use crate::pacing::Pacer;
use crate::remote::{RemoteConnector, RemoteGraph};
use graphwatch_protocol::{CrossCheckResult, RelationshipMode};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Follower/following id sets fetched during one multi-check session.
/// The remote API has no "does A follow B" query, so each list is
/// fetched once per account and reused for every target.
#[derive(Default)]
pub struct RelationshipCache {
    sets: HashMap<(String, RelationshipMode), HashSet<String>>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ids(
        &mut self,
        client: &dyn RemoteGraph,
        owner_id: &str,
        mode: RelationshipMode,
    ) -> Result<&HashSet<String>, RemoteError> {
        let key = (owner_id.to_string(), mode);
        if !self.sets.contains_key(&key) {
            let list = match mode {
                RelationshipMode::Follower => client.list_followers(owner_id).await?,
                RelationshipMode::Following => client.list_following(owner_id).await?,
            };
            let set = list.into_iter().map(|i| i.id).collect();
            self.sets.insert(key.clone(), set);
        }
        Ok(&self.sets[&key])
    }
}

/// With `Follower`: does `target_handle` follow `owner_id`?
/// With `Following`: does `owner_id` follow `target_handle`?
pub async fn check_relationship(
    client: &dyn RemoteGraph,
    cache: &mut RelationshipCache,
    owner_id: &str,
    target_handle: &str,
    mode: RelationshipMode,
) -> GraphResult<bool> {
    let target = target_handle.trim();
    if target.is_empty() {
        return Err(GraphError::InvalidInput("target handle is empty".into()));
    }
    let target_id = client
        .resolve_id(target)
        .await
        .map_err(|e| GraphError::remote(format!("resolve {target}"), e))?;
    let ids = cache
        .ids(client, owner_id, mode)
        .await
        .map_err(|e| GraphError::remote(format!("fetch relationships of {owner_id}"), e))?;
    Ok(ids.contains(&target_id))
}

/// Log into each of `accounts` with the shared `secret` and report whether
/// `target_handle` follows it. Each account's follower list is fetched once.
/// An unknown target stops the run since every later account would fail the same way.
pub async fn cross_check_accounts(
    connector: &dyn RemoteConnector,
    pacer: &mut Pacer,
    accounts: &[String],
    secret: &str,
    target_handle: &str,
) -> GraphResult<Vec<CrossCheckResult>> {
    let target = target_handle.trim();
    let accounts: Vec<&str> = accounts
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if target.is_empty() || accounts.is_empty() || secret.is_empty() {
        return Err(GraphError::InvalidInput(
            "target, accounts and password are all required".into(),
        ));
    }

    let mut out = Vec::with_capacity(accounts.len());
    let mut cache = RelationshipCache::new();
    for account in accounts {
        pacer.acquire().await;
        let client = match login(connector, account, secret).await {
            Ok(c) => c,
            Err(e) => {
                warn!(account, "cross-check login failed: {e}");
                out.push(unchecked(account, format!("could not log in as {account}: {e}")));
                continue;
            }
        };
        let owner_id = client.self_id().to_string();
        match check_relationship(
            client.as_ref(),
            &mut cache,
            &owner_id,
            target,
            RelationshipMode::Follower,
        )
        .await
        {
            Ok(follows) => {
                info!(account, target, follows, "cross-check");
                let detail = if follows {
                    format!("{target} follows {account}")
                } else {
                    format!("{target} does not follow {account}")
                };
                out.push(CrossCheckResult {
                    account: account.to_string(),
                    follows: Some(follows),
                    detail,
                });
            }
            Err(GraphError::NotFound { .. }) => {
                warn!(target, "cross-check target not found, stopping");
                out.push(unchecked(account, format!("user '{target}' not found")));
                break;
            }
            Err(e) => {
                warn!(account, "cross-check failed: {e}");
                out.push(unchecked(account, format!("could not check {account}: {e}")));
            }
        }
    }
    Ok(out)
}

async fn login(
    connector: &dyn RemoteConnector,
    account: &str,
    secret: &str,
) -> Result<std::sync::Arc<dyn RemoteGraph>, RemoteError> {
    let state = connector.authenticate(account, secret).await?;
    connector.resume(&state).await
}

fn unchecked(account: &str, detail: String) -> CrossCheckResult {
    CrossCheckResult {
        account: account.to_string(),
        follows: None,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_remote::MemoryRemote;
    use crate::pacing::{ManualClock, PaceSettings};
    use chrono::NaiveDate;
    use graphwatch_protocol::Identity;
    use std::sync::Arc;
    use std::time::Duration;

    fn remote() -> MemoryRemote {
        let r = MemoryRemote::new();
        r.add_account(Identity::new("a0", "alice", ""), "pw");
        r.add_account(Identity::new("b0", "bob", ""), "pw");
        r.add_user(Identity::new("t1", "target", ""));
        r
    }

    fn pacer(clock: &ManualClock) -> Pacer {
        Pacer::new(Arc::new(clock.clone()), PaceSettings::fixed(Duration::from_secs(2)))
    }

    fn clock() -> ManualClock {
        ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    async fn session(r: &MemoryRemote, handle: &str) -> Arc<dyn RemoteGraph> {
        let s = r.authenticate(handle, "pw").await.unwrap();
        r.resume(&s).await.unwrap()
    }

    #[tokio::test]
    async fn follower_and_following_checks() {
        let r = remote();
        r.link("t1", "a0");
        let client = session(&r, "alice").await;
        let mut cache = RelationshipCache::new();
        assert!(check_relationship(client.as_ref(), &mut cache, "a0", "target", RelationshipMode::Follower)
            .await
            .unwrap());
        assert!(!check_relationship(client.as_ref(), &mut cache, "a0", "target", RelationshipMode::Following)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn cache_fetches_each_list_once() {
        let r = remote();
        r.add_user(Identity::new("t2", "other", ""));
        r.link("t2", "a0");
        let client = session(&r, "alice").await;
        let mut cache = RelationshipCache::new();
        for target in ["target", "other", "target"] {
            check_relationship(client.as_ref(), &mut cache, "a0", target, RelationshipMode::Follower)
                .await
                .unwrap();
        }
        assert_eq!(r.calls_of("followers"), vec!["a0"]);
        assert_eq!(r.calls_of("resolve").len(), 3);
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let r = remote();
        let client = session(&r, "alice").await;
        let mut cache = RelationshipCache::new();
        let err = check_relationship(client.as_ref(), &mut cache, "a0", "nobody", RelationshipMode::Follower)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cross_check_reports_per_account() {
        let r = remote();
        r.link("t1", "b0");
        let c = clock();
        let mut p = pacer(&c);
        let accounts = vec!["alice".to_string(), "mallory".to_string(), "bob".to_string()];
        let out = cross_check_accounts(&r, &mut p, &accounts, "pw", "target").await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].follows, Some(false));
        assert_eq!(out[1].follows, None);
        assert!(out[1].detail.contains("mallory"));
        assert_eq!(out[2].follows, Some(true));
        assert_eq!(out[2].detail, "target follows bob");
        assert_eq!(r.calls_of("followers"), vec!["a0", "b0"]);
        assert_eq!(c.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn cross_check_stops_on_unknown_target() {
        let r = remote();
        let c = clock();
        let mut p = pacer(&c);
        let accounts = vec!["alice".to_string(), "bob".to_string()];
        let out = cross_check_accounts(&r, &mut p, &accounts, "pw", "ghost").await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].detail, "user 'ghost' not found");
        assert!(r.calls_of("login").iter().all(|h| h == "alice"));
    }

    #[tokio::test]
    async fn cross_check_requires_all_fields() {
        let r = remote();
        let c = clock();
        let mut p = pacer(&c);
        let err = cross_check_accounts(&r, &mut p, &[" ".to_string()], "pw", "target")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
    }
}
