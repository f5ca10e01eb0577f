/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::GraphResult;
use crate::harvest::Harvester;
use crate::remote::RemoteGraph;
use graphwatch_protocol::{HarvestReport, JobState, JobStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Held while a task drives an owner's remote session. One per owner.
pub type WorkerGuard = OwnedMutexGuard<()>;

/// Harvest run status per owner, plus the per-owner worker lock that keeps
/// harvests and action batches from using one session at the same time.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobStatus>>>,
    workers: Arc<Mutex<HashMap<String, Arc<TokioMutex<()>>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobStatus>> {
        match self.jobs.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn worker_lock(&self, owner: &str) -> Arc<TokioMutex<()>> {
        let mut workers = match self.workers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        workers.entry(owner.to_string()).or_default().clone()
    }

    /// Claim `owner`'s session for one task. `None` while a harvest is
    /// running or another task holds it.
    pub fn try_worker(&self, owner: &str) -> Option<WorkerGuard> {
        if self.status(owner).state == JobState::Running {
            return None;
        }
        self.worker_lock(owner).try_lock_owned().ok()
    }

    pub fn status(&self, owner: &str) -> JobStatus {
        self.lock()
            .get(owner)
            .cloned()
            .unwrap_or_else(JobStatus::not_started)
    }

    pub fn try_start(&self, owner: &str) -> bool {
        let mut jobs = self.lock();
        if jobs
            .get(owner)
            .map(|s| s.state == JobState::Running)
            .unwrap_or(false)
        {
            return false;
        }
        jobs.insert(
            owner.to_string(),
            JobStatus {
                state: JobState::Running,
                started_at_ms: Some(now_ms()),
                finished_at_ms: None,
                report: None,
                error: None,
            },
        );
        true
    }

    pub fn finish(&self, owner: &str, result: &GraphResult<HarvestReport>) {
        match result {
            Ok(report) => self.record(owner, Ok(report.clone())),
            Err(e) => self.record(owner, Err(e.to_string())),
        }
    }

    fn record(&self, owner: &str, outcome: Result<HarvestReport, String>) {
        let mut jobs = self.lock();
        let status = jobs
            .entry(owner.to_string())
            .or_insert_with(JobStatus::not_started);
        status.finished_at_ms = Some(now_ms());
        match outcome {
            Ok(report) => {
                status.state = JobState::Done;
                status.report = Some(report);
                status.error = None;
            }
            Err(message) => {
                status.state = JobState::Failed;
                status.error = Some(message);
            }
        }
    }

    /// Start a harvest run for `owner` on a background task. Returns `None`
    /// when the owner's session is already busy.
    pub fn spawn_harvest(
        &self,
        owner: &str,
        harvester: Harvester,
        client: Arc<dyn RemoteGraph>,
    ) -> Option<JoinHandle<()>> {
        let Some(worker) = self.try_worker(owner) else {
            warn!(owner, "session busy, harvest not started");
            return None;
        };
        if !self.try_start(owner) {
            warn!(owner, "harvest already running");
            return None;
        }
        info!(owner, "harvest job started");
        let registry = self.clone();
        let owner = owner.to_string();
        Some(tokio::spawn(async move {
            let run = tokio::spawn(async move { harvester.run(client.as_ref()).await });
            match run.await {
                Ok(result) => {
                    match &result {
                        Ok(report) => info!(
                            owner = %owner,
                            processed = report.processed,
                            failed = report.failed,
                            "harvest job done"
                        ),
                        Err(e) => error!(owner = %owner, "harvest job failed: {e:#}"),
                    }
                    registry.finish(&owner, &result);
                }
                Err(e) => {
                    error!(owner = %owner, "harvest task aborted: {e}");
                    registry.record(&owner, Err(format!("harvest task aborted: {e}")));
                }
            }
            drop(worker);
        }))
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
