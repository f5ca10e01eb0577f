/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::NaiveDate;
use graphwatch_protocol::Identity;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

const DATE_FMT: &str = "%Y-%m-%d";

/// Dated follower/following capture for one owner. At most one per (owner, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub owner: String,
    pub date: NaiveDate,
    pub followers: Vec<Identity>,
    pub following: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub owner: String,
    pub date: String,
    pub followers: u64,
    pub following: u64,
}

impl Snapshot {
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            owner: self.owner.clone(),
            date: self.date.format(DATE_FMT).to_string(),
            followers: self.followers.len() as u64,
            following: self.following.len() as u64,
        }
    }
}

#[derive(Clone)]
pub struct SnapshotDb {
    path: PathBuf,
}

impl SnapshotDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS snapshots (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              owner TEXT NOT NULL,
              snapshot_date TEXT NOT NULL,
              followers_json TEXT NOT NULL,
              following_json TEXT NOT NULL,
              updated_at_ms INTEGER NOT NULL,
              UNIQUE(owner, snapshot_date)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_owner_date ON snapshots(owner, snapshot_date DESC);
            "#,
        )?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Insert or fully replace the snapshot for `(owner, date)`.
    pub fn put(
        &self,
        owner: &str,
        date: NaiveDate,
        followers: &[Identity],
        following: &[Identity],
    ) -> Result<()> {
        let followers_json = serde_json::to_string(followers).context("serialize followers")?;
        let following_json = serde_json::to_string(following).context("serialize following")?;
        let conn = Connection::open(&self.path)?;
        conn.execute(
            r#"
            INSERT INTO snapshots(owner, snapshot_date, followers_json, following_json, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(owner, snapshot_date) DO UPDATE SET
              followers_json=excluded.followers_json,
              following_json=excluded.following_json,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![
                owner,
                date.format(DATE_FMT).to_string(),
                followers_json,
                following_json,
                now_ms()
            ],
        )
        .with_context(|| format!("store snapshot for {owner}"))?;
        Ok(())
    }

    pub fn get(&self, owner: &str, date: NaiveDate) -> Result<Option<Snapshot>> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            r#"
            SELECT owner, snapshot_date, followers_json, following_json
            FROM snapshots WHERE owner=?1 AND snapshot_date=?2
            "#,
            params![owner, date.format(DATE_FMT).to_string()],
            raw_row,
        )
        .optional()?
        .map(decode_row)
        .transpose()
    }

    pub fn get_latest(&self, owner: &str) -> Result<Option<Snapshot>> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            r#"
            SELECT owner, snapshot_date, followers_json, following_json
            FROM snapshots WHERE owner=?1
            ORDER BY snapshot_date DESC LIMIT 1
            "#,
            params![owner],
            raw_row,
        )
        .optional()?
        .map(decode_row)
        .transpose()
    }

    /// Most recent snapshot strictly older than `before`.
    pub fn get_previous(&self, owner: &str, before: NaiveDate) -> Result<Option<Snapshot>> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            r#"
            SELECT owner, snapshot_date, followers_json, following_json
            FROM snapshots WHERE owner=?1 AND snapshot_date < ?2
            ORDER BY snapshot_date DESC LIMIT 1
            "#,
            params![owner, before.format(DATE_FMT).to_string()],
            raw_row,
        )
        .optional()?
        .map(decode_row)
        .transpose()
    }

    /// Latest snapshot of every owner except `owner`, ordered by owner.
    pub fn get_latest_for_all_except(&self, owner: &str) -> Result<Vec<Snapshot>> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s1.owner, s1.snapshot_date, s1.followers_json, s1.following_json
            FROM snapshots s1
            LEFT JOIN snapshots s2
              ON s1.owner = s2.owner AND s1.snapshot_date < s2.snapshot_date
            WHERE s2.id IS NULL AND s1.owner != ?1
            ORDER BY s1.owner ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![owner], raw_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(decode_row).collect()
    }

    /// Capture dates for `owner`, oldest first.
    pub fn list_dates(&self, owner: &str) -> Result<Vec<NaiveDate>> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare(
            "SELECT snapshot_date FROM snapshots WHERE owner=?1 ORDER BY snapshot_date ASC",
        )?;
        let rows = stmt
            .query_map(params![owner], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.iter().map(|d| parse_date(d)).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let conn = Connection::open(&self.path)?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
        Ok(total)
    }
}

type RawRow = (String, String, String, String);

fn raw_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
}

fn decode_row((owner, date, followers_json, following_json): RawRow) -> Result<Snapshot> {
    let followers = serde_json::from_str(&followers_json)
        .with_context(|| format!("decode followers of {owner}@{date}"))?;
    let following = serde_json::from_str(&following_json)
        .with_context(|| format!("decode following of {owner}@{date}"))?;
    Ok(Snapshot {
        date: parse_date(&date)?,
        owner,
        followers,
        following,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("invalid snapshot date: {s}"))
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

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FMT).unwrap()
    }

    fn user(id: &str, handle: &str) -> Identity {
        Identity::new(id, handle, "")
    }

    #[test]
    fn open_and_migrate_twice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graphwatch.db");
        SnapshotDb::open(&path).unwrap();
        let db = SnapshotDb::open(&path).unwrap();
        db.health_check().unwrap();
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        let followers = vec![user("1", "a")];
        let following = vec![user("2", "b")];
        db.put("alice", day("2024-01-01"), &followers, &following).unwrap();
        db.put("alice", day("2024-01-01"), &followers, &following).unwrap();
        assert_eq!(db.count().unwrap(), 1);
        let snap = db.get("alice", day("2024-01-01")).unwrap().unwrap();
        assert_eq!(snap.followers, followers);
        assert_eq!(snap.following, following);
    }

    #[test]
    fn same_day_put_replaces_whole_snapshot() {
        let dir = tempdir().unwrap();
        let db = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        db.put("alice", day("2024-01-01"), &[user("1", "a")], &[user("2", "b")]).unwrap();
        db.put("alice", day("2024-01-01"), &[user("3", "c")], &[]).unwrap();
        let latest = db.get_latest("alice").unwrap().unwrap();
        assert_eq!(latest.followers, vec![user("3", "c")]);
        assert!(latest.following.is_empty());
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn latest_is_by_date_not_insert_order() {
        let dir = tempdir().unwrap();
        let db = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        db.put("alice", day("2024-03-01"), &[user("1", "a")], &[]).unwrap();
        db.put("alice", day("2024-01-01"), &[], &[]).unwrap();
        let latest = db.get_latest("alice").unwrap().unwrap();
        assert_eq!(latest.date, day("2024-03-01"));
        assert_eq!(db.list_dates("alice").unwrap(), vec![day("2024-01-01"), day("2024-03-01")]);
        let prev = db.get_previous("alice", day("2024-03-01")).unwrap().unwrap();
        assert_eq!(prev.date, day("2024-01-01"));
        assert!(db.get_previous("alice", day("2024-01-01")).unwrap().is_none());
    }

    #[test]
    fn missing_owner_is_absent() {
        let dir = tempdir().unwrap();
        let db = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        assert!(db.get_latest("nobody").unwrap().is_none());
    }

    #[test]
    fn overview_lists_latest_of_other_owners() {
        let dir = tempdir().unwrap();
        let db = SnapshotDb::open(dir.path().join("graphwatch.db")).unwrap();
        db.put("alice", day("2024-01-02"), &[], &[]).unwrap();
        db.put("bob", day("2024-01-01"), &[user("1", "a")], &[]).unwrap();
        db.put("bob", day("2024-01-05"), &[user("1", "a"), user("2", "b")], &[]).unwrap();
        db.put("carol", day("2024-01-03"), &[], &[user("9", "z")]).unwrap();

        let rows = db.get_latest_for_all_except("alice").unwrap();
        let summary: Vec<_> = rows.iter().map(Snapshot::summary).collect();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].owner, "bob");
        assert_eq!(summary[0].date, "2024-01-05");
        assert_eq!(summary[0].followers, 2);
        assert_eq!(summary[1].owner, "carol");
        assert_eq!(summary[1].following, 1);
    }
}
