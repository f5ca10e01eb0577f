/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod actions;
pub mod config;
pub mod diff;
pub mod error;
pub mod export;
pub mod harvest;
pub mod http_retry;
pub mod jobs;
pub mod link_queue;
pub mod memory_remote;
pub mod pacing;
pub mod relationship;
pub mod remote;
pub mod remote_http;
pub mod remote_metrics;
pub mod session_db;
pub mod snapshot_db;

pub use error::{GraphError, GraphResult, RemoteError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
