/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Turns pending profile links into fresh snapshots.
//!
//! Per run: fetch pending links once, then for each link extract the handle,
//! capture followers/following dated with the run's day, and mark the link
//! processed only when the capture was stored. Captures are separated by a
//! fixed pacing interval. A link that fails stays pending for the next run.

use crate::error::{GraphError, GraphResult};
use crate::link_queue::{extract_handle, LinkQueue};
use crate::pacing::{Clock, PaceSettings, Pacer};
use crate::remote::RemoteGraph;
use crate::remote_metrics::RemoteMetrics;
use crate::snapshot_db::{Snapshot, SnapshotDb};
use chrono::NaiveDate;
use graphwatch_protocol::HarvestReport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct HarvestSettings {
    pub domain_marker: String,
    pub interval: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            domain_marker: "instagram.com/".to_string(),
            interval: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct Harvester {
    store: SnapshotDb,
    queue: Arc<dyn LinkQueue>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RemoteMetrics>,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(
        store: SnapshotDb,
        queue: Arc<dyn LinkQueue>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RemoteMetrics>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            metrics,
            settings,
        }
    }

    /// One pass over the pending queue. Only a queue or storage failure
    /// aborts; remote failures are counted and the link is left pending.
    pub async fn run(&self, client: &dyn RemoteGraph) -> GraphResult<HarvestReport> {
        self.metrics.harvest_started();
        let today = self.clock.today();
        let links = self.queue.list_unprocessed().await?;
        let mut report = HarvestReport {
            pending: links.len() as u64,
            ..Default::default()
        };
        if links.is_empty() {
            info!("no new links to process");
            return Ok(report);
        }
        info!(count = links.len(), %today, "harvest run started");

        let mut pacer = Pacer::new(self.clock.clone(), PaceSettings::fixed(self.settings.interval));
        for link in links {
            let Some(handle) = extract_handle(&link.url, &self.settings.domain_marker) else {
                warn!(link_id = link.id, url = %link.url, "no handle in link, skipping");
                report.invalid_links += 1;
                continue;
            };

            pacer.acquire().await;
            info!(link_id = link.id, owner = %handle, "capturing snapshot");
            match capture_snapshot(client, &self.store, &handle, today).await {
                Ok(snap) => {
                    self.metrics.snapshot_saved();
                    self.queue.mark_processed(link.id).await?;
                    report.processed += 1;
                    info!(
                        link_id = link.id,
                        owner = %handle,
                        followers = snap.followers.len(),
                        following = snap.following.len(),
                        "link processed"
                    );
                }
                Err(e @ GraphError::Storage { .. }) => {
                    warn!(link_id = link.id, "snapshot store failed, aborting run: {e}");
                    return Err(e);
                }
                Err(e) => {
                    if e.is_auth() {
                        report.auth_failures += 1;
                    }
                    report.failed += 1;
                    warn!(link_id = link.id, owner = %handle, "capture failed, link left pending: {e}");
                }
            }
        }
        info!(
            processed = report.processed,
            failed = report.failed,
            invalid = report.invalid_links,
            "harvest run finished"
        );
        Ok(report)
    }
}

/// Fetch `handle`'s followers and following and store them under `date`.
pub async fn capture_snapshot(
    client: &dyn RemoteGraph,
    store: &SnapshotDb,
    handle: &str,
    date: NaiveDate,
) -> GraphResult<Snapshot> {
    let id = client
        .resolve_id(handle)
        .await
        .map_err(|e| GraphError::remote(format!("resolve {handle}"), e))?;
    let followers = client
        .list_followers(&id)
        .await
        .map_err(|e| GraphError::remote(format!("list followers of {handle}"), e))?;
    let following = client
        .list_following(&id)
        .await
        .map_err(|e| GraphError::remote(format!("list following of {handle}"), e))?;

    let snap = Snapshot {
        owner: handle.to_string(),
        date,
        followers,
        following,
    };
    let context = format!("store snapshot of {handle}");
    tokio::task::spawn_blocking({
        let store = store.clone();
        let snap = snap.clone();
        move || store.put(&snap.owner, snap.date, &snap.followers, &snap.following)
    })
    .await
    .map_err(|e| GraphError::storage(context.clone(), e.into()))?
    .map_err(|e| GraphError::storage(context, e))?;
    Ok(snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::link_queue::{PendingLink, SqliteLinkQueue};
    use crate::memory_remote::MemoryRemote;
    use crate::pacing::ManualClock;
    use crate::remote::RemoteConnector;
    use async_trait::async_trait;
    use graphwatch_protocol::Identity;
    use tempfile::{tempdir, TempDir};

    /// Reads from the real queue but cannot record progress.
    struct ReadOnlyQueue(Arc<SqliteLinkQueue>);

    #[async_trait]
    impl LinkQueue for ReadOnlyQueue {
        async fn list_unprocessed(&self) -> GraphResult<Vec<PendingLink>> {
            self.0.list_unprocessed().await
        }

        async fn mark_processed(&self, id: i64) -> GraphResult<()> {
            Err(GraphError::storage(
                format!("mark link {id}"),
                anyhow::anyhow!("disk full"),
            ))
        }
    }

    struct Fixture {
        _dir: TempDir,
        remote: MemoryRemote,
        clock: ManualClock,
        store: SnapshotDb,
        queue: Arc<SqliteLinkQueue>,
        harvester: Harvester,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        let queue = Arc::new(SqliteLinkQueue::open(dir.path().join("links.db")).unwrap());
        let remote = MemoryRemote::new();
        remote.add_account(Identity::new("me", "operator", ""), "pw");
        for (id, handle) in [("p1", "first"), ("p2", "second"), ("p3", "third"), ("f1", "fan")] {
            remote.add_user(Identity::new(id, handle, ""));
        }
        remote.link("f1", "p1");
        remote.link("p1", "p3");
        let clock = ManualClock::new(today());
        let harvester = Harvester::new(
            store.clone(),
            queue.clone(),
            Arc::new(clock.clone()),
            Arc::new(RemoteMetrics::new()),
            HarvestSettings::default(),
        );
        Fixture {
            _dir: dir,
            remote,
            clock,
            store,
            queue,
            harvester,
        }
    }

    async fn client(r: &MemoryRemote) -> Arc<dyn RemoteGraph> {
        let s = r.authenticate("operator", "pw").await.unwrap();
        r.resume(&s).await.unwrap()
    }

    fn links(handles: &[&str]) -> Vec<String> {
        handles
            .iter()
            .map(|h| format!("https://www.instagram.com/{h}/"))
            .collect()
    }

    #[tokio::test]
    async fn failed_capture_leaves_link_pending() {
        let f = fixture();
        f.queue.add_links(links(&["first", "second", "third"])).await.unwrap();
        f.remote
            .fail("followers", "p2", RemoteError::Transient("rate limited".into()));
        let c = client(&f.remote).await;

        let report = f.harvester.run(c.as_ref()).await.unwrap();
        assert_eq!(report.pending, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);

        assert!(f.queue.get(1).await.unwrap().unwrap().processed);
        assert!(!f.queue.get(2).await.unwrap().unwrap().processed);
        assert!(f.queue.get(3).await.unwrap().unwrap().processed);
        assert_eq!(f.store.count().unwrap(), 2);
        assert!(f.store.get_latest("second").unwrap().is_none());
        assert_eq!(f.clock.sleeps(), vec![Duration::from_secs(60); 2]);

        let first = f.store.get_latest("first").unwrap().unwrap();
        assert_eq!(first.date, today());
        assert_eq!(first.followers[0].handle, "fan");
        assert_eq!(first.following[0].handle, "third");
    }

    #[tokio::test]
    async fn retry_run_picks_up_only_pending_links() {
        let f = fixture();
        f.queue.add_links(links(&["first", "second"])).await.unwrap();
        f.remote
            .fail("resolve", "second", RemoteError::Transient("timeout".into()));
        let c = client(&f.remote).await;
        f.harvester.run(c.as_ref()).await.unwrap();

        f.remote.clear_failure("resolve", "second");
        let report = f.harvester.run(c.as_ref()).await.unwrap();
        assert_eq!(report.pending, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(f.remote.calls_of("resolve"), vec!["first", "second", "second"]);
    }

    #[tokio::test]
    async fn invalid_links_are_skipped_without_pacing() {
        let f = fixture();
        f.queue
            .add_links(vec![
                "https://example.com/nothing".into(),
                "https://instagram.com/first".into(),
            ])
            .await
            .unwrap();
        let c = client(&f.remote).await;
        let report = f.harvester.run(c.as_ref()).await.unwrap();
        assert_eq!(report.invalid_links, 1);
        assert_eq!(report.processed, 1);
        assert!(f.clock.sleeps().is_empty());
        assert!(!f.queue.get(1).await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn auth_loss_is_counted_per_item() {
        let f = fixture();
        f.queue.add_links(links(&["first", "third"])).await.unwrap();
        let c = client(&f.remote).await;
        f.remote.revoke("operator");
        let report = f.harvester.run(c.as_ref()).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.auth_failures, 2);
        assert_eq!(f.queue.list_unprocessed().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_queue_is_done_immediately() {
        let f = fixture();
        let c = client(&f.remote).await;
        let report = f.harvester.run(c.as_ref()).await.unwrap();
        assert_eq!(report, HarvestReport::default());
        assert!(f.remote.calls_of("resolve").is_empty());
    }

    #[tokio::test]
    async fn unreachable_queue_aborts_run() {
        let f = fixture();
        f.queue.add_links(links(&["first"])).await.unwrap();
        std::fs::remove_file(f.queue.db_path()).unwrap();
        std::fs::create_dir(f.queue.db_path()).unwrap();
        let c = client(&f.remote).await;
        let err = f.harvester.run(c.as_ref()).await.unwrap_err();
        assert!(matches!(err, GraphError::QueueConnection { .. }));
        assert_eq!(f.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn storage_failure_aborts_run() {
        let f = fixture();
        f.queue.add_links(links(&["first", "second"])).await.unwrap();
        let db = f.store.path().to_path_buf();
        std::fs::remove_file(&db).unwrap();
        std::fs::create_dir(&db).unwrap();
        let c = client(&f.remote).await;

        let err = f.harvester.run(c.as_ref()).await.unwrap_err();
        assert!(matches!(err, GraphError::Storage { .. }));
        assert_eq!(f.remote.calls_of("resolve"), vec!["first"]);
        assert_eq!(f.queue.list_unprocessed().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_mark_aborts_run() {
        let f = fixture();
        f.queue.add_links(links(&["first", "second"])).await.unwrap();
        let harvester = Harvester::new(
            f.store.clone(),
            Arc::new(ReadOnlyQueue(f.queue.clone())),
            Arc::new(f.clock.clone()),
            Arc::new(RemoteMetrics::new()),
            HarvestSettings::default(),
        );
        let c = client(&f.remote).await;

        let err = harvester.run(c.as_ref()).await.unwrap_err();
        assert!(matches!(err, GraphError::Storage { .. }));
        assert!(err.to_string().contains("mark link 1"));
        assert_eq!(f.remote.calls_of("resolve"), vec!["first"]);
        assert_eq!(f.store.count().unwrap(), 1);
        assert_eq!(f.queue.list_unprocessed().await.unwrap().len(), 2);
    }
}
