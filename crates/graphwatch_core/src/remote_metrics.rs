/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::RemoteError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Default)]
pub struct RemoteMetrics {
    pub auth_failures: AtomicU64,
    pub not_found: AtomicU64,
    pub transient_errors: AtomicU64,
    pub rate_limit_hits: AtomicU64,
    pub http_timeouts: AtomicU64,
    pub http_errors: AtomicU64,

    pub follows: AtomicU64,
    pub unfollows: AtomicU64,
    pub snapshots: AtomicU64,
    pub harvest_runs: AtomicU64,

    last_error: Mutex<Option<String>>,
}

impl RemoteMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, err: &RemoteError) {
        match err {
            RemoteError::Auth(_) => self.auth_failures.fetch_add(1, Ordering::Relaxed),
            RemoteError::NotFound(_) => self.not_found.fetch_add(1, Ordering::Relaxed),
            RemoteError::Transient(_) => self.transient_errors.fetch_add(1, Ordering::Relaxed),
        };
        if let Ok(mut g) = self.last_error.lock() {
            *g = Some(err.to_string());
        }
    }

    pub fn rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_timeout(&self) {
        self.http_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_error(&self) {
        self.http_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn followed(&self) {
        self.follows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unfollowed(&self) {
        self.unfollows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_saved(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn harvest_started(&self) {
        self.harvest_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        let last_error = self.last_error.lock().ok().and_then(|g| g.clone());
        serde_json::json!({
            "ts_ms": now_ms(),
            "actions": {
                "follows": self.follows.load(Ordering::Relaxed),
                "unfollows": self.unfollows.load(Ordering::Relaxed),
                "snapshots": self.snapshots.load(Ordering::Relaxed),
                "harvest_runs": self.harvest_runs.load(Ordering::Relaxed),
            },
            "errors": {
                "auth_failures": self.auth_failures.load(Ordering::Relaxed),
                "not_found": self.not_found.load(Ordering::Relaxed),
                "transient": self.transient_errors.load(Ordering::Relaxed),
                "rate_limit_hits": self.rate_limit_hits.load(Ordering::Relaxed),
                "http_timeouts": self.http_timeouts.load(Ordering::Relaxed),
                "http_errors": self.http_errors.load(Ordering::Relaxed),
                "last_error": last_error,
            },
        })
    }
}
