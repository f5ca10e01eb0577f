/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::{GraphError, GraphResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Externally supplied profile link waiting to be captured.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PendingLink {
    pub id: i64,
    pub url: String,
    pub processed: bool,
}

#[async_trait]
pub trait LinkQueue: Send + Sync {
    /// Unprocessed links in id order. Fails with `QueueConnection`.
    async fn list_unprocessed(&self) -> GraphResult<Vec<PendingLink>>;
    async fn mark_processed(&self, id: i64) -> GraphResult<()>;
}

/// `links(id, url, processed)` table, possibly shared with another tool.
#[derive(Clone)]
pub struct SqliteLinkQueue {
    db_path: PathBuf,
}

impl SqliteLinkQueue {
    pub fn open(db_path: impl AsRef<Path>) -> GraphResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        init_db(&db_path).map_err(|source| GraphError::QueueConnection { source })?;
        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn add_links(&self, urls: Vec<String>) -> GraphResult<u64> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut conn = Connection::open(db_path)?;
            let tx = conn.transaction()?;
            let mut added = 0u64;
            for url in urls {
                let url = url.trim();
                if url.is_empty() {
                    continue;
                }
                tx.execute("INSERT INTO links(url, processed) VALUES (?1, 0)", params![url])?;
                added += 1;
            }
            tx.commit()?;
            Ok(added)
        })
        .await
        .map_err(|e| GraphError::storage("add links", e.into()))?
        .map_err(|e| GraphError::storage("add links", e))
    }

    pub async fn get(&self, id: i64) -> GraphResult<Option<PendingLink>> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<PendingLink>> {
            let conn = Connection::open(db_path)?;
            let mut stmt = conn.prepare("SELECT id, url, processed FROM links WHERE id=?1")?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(r) => Ok(Some(PendingLink {
                    id: r.get(0)?,
                    url: r.get(1)?,
                    processed: r.get::<_, i64>(2)? != 0,
                })),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| GraphError::storage(format!("read link {id}"), e.into()))?
        .map_err(|e| GraphError::storage(format!("read link {id}"), e))
    }
}

#[async_trait]
impl LinkQueue for SqliteLinkQueue {
    async fn list_unprocessed(&self) -> GraphResult<Vec<PendingLink>> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<PendingLink>> {
            let conn = Connection::open(&db_path)
                .with_context(|| format!("open links db: {}", db_path.display()))?;
            let mut stmt =
                conn.prepare("SELECT id, url FROM links WHERE processed = 0 ORDER BY id ASC")?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(PendingLink {
                        id: r.get(0)?,
                        url: r.get(1)?,
                        processed: false,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
        .map_err(|e| GraphError::QueueConnection { source: e.into() })?
        .map_err(|source| GraphError::QueueConnection { source })
    }

    async fn mark_processed(&self, id: i64) -> GraphResult<()> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(db_path)?;
            conn.execute("UPDATE links SET processed = 1 WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(|e| GraphError::storage(format!("mark link {id} processed"), e.into()))?
        .map_err(|e| GraphError::storage(format!("mark link {id} processed"), e))
    }
}

fn init_db(path: &Path) -> Result<()> {
    let conn =
        Connection::open(path).with_context(|| format!("open links db: {}", path.display()))?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS links (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          url TEXT NOT NULL
        );
        "#,
    )?;
    ensure_columns(&conn, "links", &[("processed", "INTEGER NOT NULL DEFAULT 0")])?;
    Ok(())
}

fn ensure_columns(conn: &Connection, table: &str, cols: &[(&str, &str)]) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = std::collections::HashSet::new();
    for r in rows {
        existing.insert(r?);
    }
    for (name, ty) in cols {
        if !existing.contains(*name) {
            conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {name} {ty}"), [])?;
        }
    }
    Ok(())
}

/// Handle in the path segment right after `marker`
/// (`https://instagram.com/alice/?hl=en` -> `alice`).
pub fn extract_handle(url: &str, marker: &str) -> Option<String> {
    let marker = marker.trim();
    if marker.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    let start = lower.find(&marker.to_ascii_lowercase())? + marker.len();
    let rest = url.get(start..)?.trim_start_matches('/');
    let segment = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('@');
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MARKER: &str = "instagram.com/";

    #[test]
    fn handle_extraction() {
        assert_eq!(extract_handle("https://www.instagram.com/alice/", MARKER).as_deref(), Some("alice"));
        assert_eq!(extract_handle("https://instagram.com/bob?hl=en", MARKER).as_deref(), Some("bob"));
        assert_eq!(extract_handle("instagram.com/@carol/reels", MARKER).as_deref(), Some("carol"));
        assert_eq!(extract_handle("https://Instagram.com/Dave", MARKER).as_deref(), Some("Dave"));
        assert_eq!(extract_handle("https://instagram.com/", MARKER), None);
        assert_eq!(extract_handle("https://example.com/alice", MARKER), None);
    }

    #[tokio::test]
    async fn queue_lists_and_marks() {
        let dir = tempdir().unwrap();
        let q = SqliteLinkQueue::open(dir.path().join("links.db")).unwrap();
        let added = q
            .add_links(vec!["https://instagram.com/a".into(), "  ".into(), "https://instagram.com/b".into()])
            .await
            .unwrap();
        assert_eq!(added, 2);
        let pending = q.list_unprocessed().await.unwrap();
        assert_eq!(pending.len(), 2);
        q.mark_processed(pending[0].id).await.unwrap();
        let pending_after = q.list_unprocessed().await.unwrap();
        assert_eq!(pending_after.len(), 1);
        assert_eq!(pending_after[0].url, "https://instagram.com/b");
        assert!(q.get(pending[0].id).await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn legacy_table_gets_processed_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("links.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE links (id INTEGER PRIMARY KEY, url TEXT NOT NULL);
                 INSERT INTO links(id, url) VALUES (7, 'https://instagram.com/x');",
            )
            .unwrap();
        }
        let q = SqliteLinkQueue::open(&path).unwrap();
        let pending = q.list_unprocessed().await.unwrap();
        assert_eq!(pending, vec![PendingLink { id: 7, url: "https://instagram.com/x".into(), processed: false }]);
    }

    #[test]
    fn unreachable_queue_is_connection_error() {
        let dir = tempdir().unwrap();
        let err = SqliteLinkQueue::open(dir.path().join("missing").join("links.db"))
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::QueueConnection { .. }));
    }
}
