/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::harvest::HarvestSettings;
use crate::pacing::PaceSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    /// Empty means the platform data dir.
    pub data_dir: String,
    /// Relative paths are resolved against `data_dir`.
    pub snapshot_db: String,
    pub links_db: String,
    pub remote_base_url: String,
    pub http_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub link_domain_marker: String,
    pub action_delay_min_secs: u64,
    pub action_delay_max_secs: u64,
    pub harvest_delay_secs: u64,
    pub cross_check_delay_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            data_dir: String::new(),
            snapshot_db: "graphwatch.db".to_string(),
            links_db: "links.db".to_string(),
            remote_base_url: "http://127.0.0.1:8790".to_string(),
            http_timeout_secs: 30,
            session_ttl_secs: 3600,
            link_domain_marker: "instagram.com/".to_string(),
            action_delay_min_secs: 5,
            action_delay_max_secs: 15,
            harvest_delay_secs: 60,
            cross_check_delay_secs: 2,
        }
    }
}

/// Pacing for the relationship action executor and multi-account checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSettings {
    pub pace: PaceSettings,
    pub cross_check_pace: PaceSettings,
}

impl DashboardConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse dashboard config json")
    }

    /// Read `path`; a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text).with_context(|| format!("config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("config missing: {} (using defaults)", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("read config {}", path.display())),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(v) = get("GRAPHWATCH_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("GRAPHWATCH_DATA_DIR") {
            self.data_dir = v;
        }
        if let Some(v) = get("GRAPHWATCH_REMOTE_URL") {
            self.remote_base_url = v;
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if !self.data_dir.trim().is_empty() {
            return Ok(PathBuf::from(self.data_dir.trim()));
        }
        let proj = ProjectDirs::from("net", "graphwatch", "GraphWatch")
            .context("unable to determine platform data dir")?;
        Ok(proj.data_local_dir().to_path_buf())
    }

    pub fn snapshot_db_path(&self) -> Result<PathBuf> {
        Ok(resolve_in(&self.data_dir()?, &self.snapshot_db))
    }

    pub fn links_db_path(&self) -> Result<PathBuf> {
        Ok(resolve_in(&self.data_dir()?, &self.links_db))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.max(60))
    }

    pub fn action_settings(&self) -> ActionSettings {
        ActionSettings {
            pace: PaceSettings::between(
                Duration::from_secs(self.action_delay_min_secs),
                Duration::from_secs(self.action_delay_max_secs),
            ),
            cross_check_pace: PaceSettings::fixed(Duration::from_secs(self.cross_check_delay_secs)),
        }
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            domain_marker: self.link_domain_marker.clone(),
            interval: Duration::from_secs(self.harvest_delay_secs),
        }
    }
}

fn resolve_in(base: &Path, file: &str) -> PathBuf {
    let p = PathBuf::from(file);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

/// `--config <path>` wins over `GRAPHWATCH_CONFIG`; `None` means defaults.
pub fn config_path_from_args(
    args: impl IntoIterator<Item = String>,
    env_value: Option<String>,
) -> Result<Option<PathBuf>> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            return Err(anyhow::anyhow!("--config requires a path"));
        }
    }
    Ok(env_value
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = DashboardConfig::from_json(r#"{"bind":"0.0.0.0:8080","harvest_delay_secs":5}"#).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.harvest_settings().interval, Duration::from_secs(5));
        assert_eq!(cfg.session_ttl_secs, 3600);
        assert_eq!(cfg.link_domain_marker, "instagram.com/");
        let a = cfg.action_settings();
        assert_eq!(a.pace.min, Duration::from_secs(5));
        assert_eq!(a.pace.max, Duration::from_secs(15));
        assert_eq!(a.cross_check_pace, PaceSettings::fixed(Duration::from_secs(2)));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().unwrap();
        let cfg = DashboardConfig::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(cfg.bind, DashboardConfig::default().bind);
        assert!(DashboardConfig::load(None).is_ok());
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(DashboardConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn env_overrides_and_relative_paths() {
        let env: HashMap<&str, &str> = [
            ("GRAPHWATCH_DATA_DIR", "/srv/gw"),
            ("GRAPHWATCH_REMOTE_URL", "https://gateway.test"),
            ("GRAPHWATCH_BIND", "  "),
        ]
        .into_iter()
        .collect();
        let mut cfg = DashboardConfig {
            links_db: "/var/lib/links.db".to_string(),
            ..Default::default()
        };
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bind, "127.0.0.1:5000");
        assert_eq!(cfg.remote_base_url, "https://gateway.test");
        assert_eq!(cfg.snapshot_db_path().unwrap(), PathBuf::from("/srv/gw/graphwatch.db"));
        assert_eq!(cfg.links_db_path().unwrap(), PathBuf::from("/var/lib/links.db"));
    }

    #[test]
    fn config_flag_beats_env() {
        let args = vec!["--config".to_string(), "a.json".to_string()];
        assert_eq!(
            config_path_from_args(args, Some("b.json".into())).unwrap(),
            Some(PathBuf::from("a.json"))
        );
        assert_eq!(
            config_path_from_args(Vec::new(), Some("b.json".into())).unwrap(),
            Some(PathBuf::from("b.json"))
        );
        assert_eq!(config_path_from_args(Vec::new(), None).unwrap(), None);
        assert!(config_path_from_args(vec!["--config".to_string()], None).is_err());
    }
}
