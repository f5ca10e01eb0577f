/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::diff::non_followers;
use crate::error::{GraphError, GraphResult, RemoteError};
use crate::pacing::Pacer;
use crate::remote::RemoteGraph;
use crate::remote_metrics::RemoteMetrics;
use graphwatch_protocol::{ActionKind, ActionOutcome, ActionResult, Identity};
use std::sync::Arc;
use tracing::{info, warn};

/// Applies follow/unfollow batches one target at a time, paced.
/// Per-target failures land in the result list; only an auth failure aborts.
pub struct ActionExecutor {
    pacer: Pacer,
    metrics: Arc<RemoteMetrics>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UnfollowReport {
    pub non_followers: usize,
    pub results: Vec<ActionResult>,
}

impl ActionExecutor {
    pub fn new(pacer: Pacer, metrics: Arc<RemoteMetrics>) -> Self {
        Self { pacer, metrics }
    }

    /// Unfollow the first `limit` of `candidates`, in the given order.
    pub async fn unfollow_batch(
        &mut self,
        client: &dyn RemoteGraph,
        candidates: &[Identity],
        limit: usize,
    ) -> GraphResult<Vec<ActionResult>> {
        if limit == 0 {
            return Err(GraphError::InvalidInput("unfollow limit must be greater than 0".into()));
        }
        let mut results = Vec::new();
        for target in candidates.iter().take(limit) {
            self.pacer.acquire().await;
            match client.unfollow(&target.id).await {
                Ok(()) => {
                    self.metrics.unfollowed();
                    info!(target = %target.handle, id = %target.id, "unfollowed");
                    results.push(result(target.handle.clone(), Some(target.id.clone()), ActionKind::Unfollow, ActionOutcome::Success, "unfollowed".into()));
                }
                Err(e) => {
                    self.metrics.record_error(&e);
                    let context = format!("unfollow {} ({})", target.handle, target.id);
                    if e.is_auth() {
                        warn!(done = results.len(), "{context}: session rejected, aborting batch");
                        return Err(GraphError::remote(context, e));
                    }
                    warn!("{context} failed: {e}");
                    results.push(result(target.handle.clone(), Some(target.id.clone()), ActionKind::Unfollow, e.outcome(), e.to_string()));
                }
            }
        }
        Ok(results)
    }

    /// Resolve and follow each handle in order.
    pub async fn follow_batch(
        &mut self,
        client: &dyn RemoteGraph,
        handles: &[String],
    ) -> GraphResult<Vec<ActionResult>> {
        let handles: Vec<&str> = handles
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect();
        if handles.is_empty() {
            return Err(GraphError::InvalidInput("no handles to follow".into()));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            self.pacer.acquire().await;
            let id = match client.resolve_id(handle).await {
                Ok(id) => id,
                Err(e) => {
                    self.metrics.record_error(&e);
                    let context = format!("follow {handle}");
                    if e.is_auth() {
                        return Err(GraphError::remote(context, e));
                    }
                    let detail = match &e {
                        RemoteError::NotFound(_) => format!("user '{handle}' not found"),
                        other => format!("could not resolve {handle}: {other}"),
                    };
                    warn!("{context}: {detail}");
                    results.push(result(handle.to_string(), None, ActionKind::Follow, e.outcome(), detail));
                    continue;
                }
            };
            match client.follow(&id).await {
                Ok(()) => {
                    self.metrics.followed();
                    info!(target = %handle, id = %id, "followed");
                    results.push(result(handle.to_string(), Some(id), ActionKind::Follow, ActionOutcome::Success, format!("followed {handle}")));
                }
                Err(e) => {
                    self.metrics.record_error(&e);
                    let context = format!("follow {handle} ({id})");
                    if e.is_auth() {
                        return Err(GraphError::remote(context, e));
                    }
                    warn!("{context} failed: {e}");
                    results.push(result(handle.to_string(), Some(id), ActionKind::Follow, e.outcome(), format!("could not follow {handle}: {e}")));
                }
            }
        }
        Ok(results)
    }

    /// Fetch the caller's own lists, then unfollow up to `limit` non-followers (lowest id first).
    pub async fn unfollow_non_followers(
        &mut self,
        client: &dyn RemoteGraph,
        limit: usize,
    ) -> GraphResult<UnfollowReport> {
        if limit == 0 {
            return Err(GraphError::InvalidInput("unfollow limit must be greater than 0".into()));
        }
        let me = client.self_id().to_string();
        let following = client
            .list_following(&me)
            .await
            .map_err(|e| self.remote_error(format!("list following of {me}"), e))?;
        let followers = client
            .list_followers(&me)
            .await
            .map_err(|e| self.remote_error(format!("list followers of {me}"), e))?;
        let candidates = non_followers(&following, &followers);
        info!(count = candidates.len(), limit, "non-followers computed");
        let results = self.unfollow_batch(client, &candidates, limit).await?;
        Ok(UnfollowReport {
            non_followers: candidates.len(),
            results,
        })
    }

    fn remote_error(&self, context: String, e: RemoteError) -> GraphError {
        self.metrics.record_error(&e);
        GraphError::remote(context, e)
    }
}

/// Split a free-form list of handles on commas and newlines.
pub fn parse_handle_list(input: &str) -> Vec<String> {
    input
        .split([',', '\n', '\r'])
        .map(|s| s.trim().trim_start_matches('@').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn result(
    target: String,
    target_id: Option<String>,
    kind: ActionKind,
    outcome: ActionOutcome,
    detail: String,
) -> ActionResult {
    ActionResult {
        target,
        target_id,
        kind,
        outcome,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_remote::MemoryRemote;
    use crate::pacing::{ManualClock, PaceSettings};
    use crate::remote::RemoteConnector;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct Fixture {
        remote: MemoryRemote,
        clock: ManualClock,
        executor: ActionExecutor,
    }

    fn fixture() -> Fixture {
        let remote = MemoryRemote::new();
        remote.add_account(Identity::new("a0", "alice", "Alice"), "pw");
        for (id, handle) in [("u1", "one"), ("u2", "two"), ("u3", "three")] {
            remote.add_user(Identity::new(id, handle, ""));
        }
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let settings = PaceSettings::between(Duration::from_secs(5), Duration::from_secs(15));
        let executor = ActionExecutor::new(
            Pacer::new(Arc::new(clock.clone()), settings),
            Arc::new(RemoteMetrics::new()),
        );
        Fixture {
            remote,
            clock,
            executor,
        }
    }

    async fn login(remote: &MemoryRemote) -> Arc<dyn RemoteGraph> {
        let state = remote.authenticate("alice", "pw").await.unwrap();
        remote.resume(&state).await.unwrap()
    }

    fn ident(id: &str) -> Identity {
        Identity::new(id, format!("h{id}"), "")
    }

    #[tokio::test]
    async fn unfollow_batch_respects_limit_order_and_pacing() {
        let mut f = fixture();
        for id in ["u1", "u2", "u3"] {
            f.remote.link("a0", id);
        }
        let client = login(&f.remote).await;
        let candidates = vec![ident("u1"), ident("u2"), ident("u3")];
        let results = f
            .executor
            .unfollow_batch(client.as_ref(), &candidates, 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(f.remote.calls_of("unfollow"), vec!["u1", "u2"]);
        assert!(results.iter().all(ActionResult::is_success));
        let sleeps = f.clock.sleeps();
        assert_eq!(sleeps.len(), 1);
        assert!(sleeps[0] >= Duration::from_secs(5) && sleeps[0] <= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn limit_larger_than_candidates_uses_all() {
        let mut f = fixture();
        f.remote.link("a0", "u1");
        let client = login(&f.remote).await;
        let results = f
            .executor
            .unfollow_batch(client.as_ref(), &[ident("u1")], 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(f.remote.calls_of("unfollow").len(), 1);
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let mut f = fixture();
        let client = login(&f.remote).await;
        let err = f
            .executor
            .unfollow_batch(client.as_ref(), &[ident("u1")], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
        assert!(f.remote.calls_of("unfollow").is_empty());
    }

    #[tokio::test]
    async fn per_target_failures_do_not_abort() {
        let mut f = fixture();
        f.remote.link("a0", "u1");
        f.remote.link("a0", "u3");
        f.remote
            .fail("unfollow", "u1", RemoteError::Transient("connection reset".into()));
        let client = login(&f.remote).await;
        let candidates = vec![ident("u1"), ident("u2"), ident("u3")];
        let results = f
            .executor
            .unfollow_batch(client.as_ref(), &candidates, 3)
            .await
            .unwrap();
        let outcomes: Vec<_> = results.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![ActionOutcome::Error, ActionOutcome::NotFound, ActionOutcome::Success]
        );
        assert!(results[0].detail.contains("connection reset"));
        assert_eq!(results[1].target, "hu2");
    }

    #[tokio::test]
    async fn auth_failure_aborts_batch() {
        let mut f = fixture();
        for id in ["u1", "u2", "u3"] {
            f.remote.link("a0", id);
        }
        f.remote
            .fail("unfollow", "u2", RemoteError::Auth("login_required".into()));
        let client = login(&f.remote).await;
        let candidates = vec![ident("u1"), ident("u2"), ident("u3")];
        let err = f
            .executor
            .unfollow_batch(client.as_ref(), &candidates, 3)
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("hu2"));
        assert_eq!(f.remote.calls_of("unfollow"), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn follow_batch_records_not_found_and_continues() {
        let mut f = fixture();
        let client = login(&f.remote).await;
        let handles = parse_handle_list("one, ghost\nthree");
        let results = f
            .executor
            .follow_batch(client.as_ref(), &handles)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, ActionOutcome::Success);
        assert_eq!(results[0].target_id.as_deref(), Some("u1"));
        assert_eq!(results[1].outcome, ActionOutcome::NotFound);
        assert_eq!(results[1].detail, "user 'ghost' not found");
        assert_eq!(results[2].outcome, ActionOutcome::Success);
        assert!(f.remote.is_following("a0", "u3"));
        assert_eq!(f.clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn follow_batch_rejects_empty_input() {
        let mut f = fixture();
        let client = login(&f.remote).await;
        let err = f
            .executor
            .follow_batch(client.as_ref(), &parse_handle_list(" ,\n "))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn non_followers_scenario_unfollows_lowest_id_first() {
        let mut f = fixture();
        for id in ["u1", "u2", "u3"] {
            f.remote.link("a0", id);
        }
        f.remote.link("u1", "a0");
        let client = login(&f.remote).await;
        let report = f
            .executor
            .unfollow_non_followers(client.as_ref(), 1)
            .await
            .unwrap();
        assert_eq!(report.non_followers, 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].target_id.as_deref(), Some("u2"));
        assert_eq!(f.remote.calls_of("unfollow"), vec!["u2"]);
        assert!(f.remote.is_following("a0", "u3"));
    }

    #[test]
    fn handle_list_parsing() {
        assert_eq!(
            parse_handle_list("@a, b\r\n\nc,,"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
