/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod app;
mod flash;
mod handlers;
mod pages;

use anyhow::{Context, Result};
use graphwatch_core::config::{config_path_from_args, DashboardConfig};
use graphwatch_core::pacing::TokioClock;
use graphwatch_core::remote_http::HttpConnector;
use graphwatch_core::remote_metrics::RemoteMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg_path = config_path_from_args(std::env::args().skip(1), std::env::var("GRAPHWATCH_CONFIG").ok())?;
    let mut cfg = DashboardConfig::load(cfg_path.as_deref())?;
    cfg.apply_env_overrides();
    if let Some(p) = &cfg_path {
        info!("config: {}", p.display());
    }

    let metrics = Arc::new(RemoteMetrics::new());
    let connector = HttpConnector::new(&cfg.remote_base_url, cfg.http_timeout(), metrics.clone())?;
    let state = app::AppState::new(&cfg, Arc::new(connector), Arc::new(TokioClock), metrics)?;
    info!(
        snapshots = %state.snapshots.path().display(),
        links = %state.links_db.display(),
        remote = %cfg.remote_base_url,
        "graphwatch {} starting",
        graphwatch_core::version()
    );

    let sessions = state.sessions.clone();
    let flashes = state.flashes.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let ttl = sessions.ttl();
            let sessions = sessions.clone();
            match app::blocking(move || sessions.prune_expired()).await {
                Ok(0) => {}
                Ok(n) => info!(pruned = n, "expired sessions removed"),
                Err(e) => error!("session prune failed: {e:#}"),
            }
            let stale = flashes.prune_older_than(ttl);
            if stale > 0 {
                info!(pruned = stale, "stale flash messages removed");
            }
        }
    });

    let addr: SocketAddr = cfg
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", cfg.bind))?;
    let router = app::router(state);
    info!("graphwatch listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("serve")?;
    Ok(())
}
