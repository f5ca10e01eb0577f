/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Browser sessions. Each row keeps the remote session state returned by
//! login so later requests resume it; the password itself is never stored.

use crate::remote::SessionState;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "gw_session";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub token: String,
    pub state: SessionState,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

#[derive(Clone)]
pub struct SessionDb {
    path: PathBuf,
    ttl: Duration,
}

impl SessionDb {
    pub fn open(db_path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS sessions (
              token TEXT PRIMARY KEY,
              handle TEXT NOT NULL,
              user_id TEXT NOT NULL,
              state_json TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              expires_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at_ms);
            "#,
        )?;
        Ok(Self { path, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, state: &SessionState) -> Result<StoredSession> {
        self.create_at(state, now_ms())
    }

    fn create_at(&self, state: &SessionState, now: i64) -> Result<StoredSession> {
        let token = random_token();
        let expires_at_ms = now.saturating_add(self.ttl.as_millis() as i64);
        let state_json = serde_json::to_string(state).context("serialize session state")?;
        let conn = Connection::open(&self.path)?;
        conn.execute(
            r#"
            INSERT INTO sessions(token, handle, user_id, state_json, created_at_ms, expires_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![token, state.handle, state.user_id, state_json, now, expires_at_ms],
        )
        .with_context(|| format!("store session for {}", state.handle))?;
        Ok(StoredSession {
            token,
            state: state.clone(),
            created_at_ms: now,
            expires_at_ms,
        })
    }

    /// Session for `token` if it has not expired. Expired rows are removed.
    pub fn get_live(&self, token: &str) -> Result<Option<StoredSession>> {
        self.get_live_at(token, now_ms())
    }

    fn get_live_at(&self, token: &str, now: i64) -> Result<Option<StoredSession>> {
        let conn = Connection::open(&self.path)?;
        let row = conn
            .query_row(
                "SELECT state_json, created_at_ms, expires_at_ms FROM sessions WHERE token=?1",
                params![token],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
            )
            .optional()?;
        let Some((state_json, created_at_ms, expires_at_ms)) = row else {
            return Ok(None);
        };
        if expires_at_ms <= now {
            conn.execute("DELETE FROM sessions WHERE token=?1", params![token])?;
            return Ok(None);
        }
        let state: SessionState =
            serde_json::from_str(&state_json).context("decode session state")?;
        Ok(Some(StoredSession {
            token: token.to_string(),
            state,
            created_at_ms,
            expires_at_ms,
        }))
    }

    pub fn delete(&self, token: &str) -> Result<bool> {
        let conn = Connection::open(&self.path)?;
        let n = conn.execute("DELETE FROM sessions WHERE token=?1", params![token])?;
        Ok(n > 0)
    }

    pub fn prune_expired(&self) -> Result<u64> {
        self.prune_expired_at(now_ms())
    }

    fn prune_expired_at(&self, now: i64) -> Result<u64> {
        let conn = Connection::open(&self.path)?;
        let n = conn.execute("DELETE FROM sessions WHERE expires_at_ms <= ?1", params![now])?;
        Ok(n as u64)
    }
}

fn random_token() -> String {
    let mut b = [0u8; 32];
    use rand::RngCore as _;
    rand::rngs::OsRng.fill_bytes(&mut b);
    hex::encode(b)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn state(handle: &str) -> SessionState {
        SessionState {
            handle: handle.to_string(),
            user_id: format!("id-{handle}"),
            settings: serde_json::json!({ "token": "abc" }),
        }
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn live_session_round_trip() {
        let dir = tempdir().unwrap();
        let db = SessionDb::open(dir.path().join("graphwatch.db"), Duration::from_secs(60)).unwrap();
        let s = db.create_at(&state("alice"), 1_000).unwrap();
        assert_eq!(s.expires_at_ms, 61_000);

        let got = db.get_live_at(&s.token, 2_000).unwrap().unwrap();
        assert_eq!(got.state, state("alice"));
        assert!(db.get_live_at("nope", 2_000).unwrap().is_none());

        assert!(db.delete(&s.token).unwrap());
        assert!(db.get_live_at(&s.token, 2_000).unwrap().is_none());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let dir = tempdir().unwrap();
        let db = SessionDb::open(dir.path().join("graphwatch.db"), Duration::from_secs(10)).unwrap();
        let old = db.create_at(&state("alice"), 0).unwrap();
        let fresh = db.create_at(&state("bob"), 50_000).unwrap();

        assert!(db.get_live_at(&old.token, 10_000).unwrap().is_none());
        assert!(!db.delete(&old.token).unwrap());

        let other = db.create_at(&state("carol"), 0).unwrap();
        assert_eq!(db.prune_expired_at(20_000).unwrap(), 1);
        assert!(db.get_live_at(&other.token, 0).unwrap().is_none());
        assert!(db.get_live_at(&fresh.token, 55_000).unwrap().is_some());
    }
}
