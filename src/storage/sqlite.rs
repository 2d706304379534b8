//! `SQLite` storage implementation.

use super::RecordStore;
use crate::error::{BeadsError, Result};
use crate::model::Issue;
use crate::storage::schema::apply_schema;
use crate::sync::jsonl::RecordSet;
use crate::util::content_hash;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

/// Metadata key holding the hash of the last flushed record set.
pub const LAST_EXPORT_HASH_KEY: &str = "jsonl_content_hash";

/// Metadata key holding the sync-branch commit the database last matched.
pub const SYNC_BASE_KEY: &str = "sync_base_commit";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a new connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a new connection with an optional busy timeout (ms).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or update a record, marking it dirty if anything changed.
    ///
    /// Returns `true` if the stored record changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record violates its lifecycle invariants or
    /// the write fails.
    pub fn upsert_issue(&mut self, issue: &Issue) -> Result<bool> {
        upsert_in(&self.conn, issue, true)
    }

    /// Fetch a record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored payload is corrupt.
    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM issues WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;
        payload.map(|p| decode(&p)).transpose()
    }

    /// Records eligible for export: tombstones included, ephemerals excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a payload is corrupt.
    pub fn get_all_issues_for_export(&self) -> Result<Vec<Issue>> {
        self.query_issues("SELECT payload FROM issues WHERE ephemeral = 0 ORDER BY id ASC")
    }

    fn query_issues(&self, sql: &str) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(sql)?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        payloads.iter().map(|p| decode(p)).collect()
    }

    /// Remove a record outright, without leaving a tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn purge_issue(&mut self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM issues WHERE id = ?", [id])?;
        if deleted > 0 {
            mark_dirty(&self.conn, id)?;
        }
        Ok(deleted > 0)
    }

    /// Count records in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_issues(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM issues", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| BeadsError::Config(e.to_string()))
    }

    /// Fetch a config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Fetch all config values from the config table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_all_config(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM config")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Set a config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteStorage {
    fn get_record_set(&self) -> Result<Vec<u8>> {
        let set: RecordSet = self.get_all_issues_for_export()?.into_iter().collect();
        set.to_bytes()
    }

    fn replace_record_set(&mut self, bytes: &[u8]) -> Result<usize> {
        let incoming = RecordSet::parse(bytes, "import")?;
        let tx = self.conn.transaction()?;

        let mut existing = BTreeSet::new();
        {
            let mut stmt = tx.prepare("SELECT id FROM issues WHERE ephemeral = 0")?;
            for id in stmt.query_map([], |row| row.get::<_, String>(0))? {
                existing.insert(id?);
            }
        }

        let mut removed = 0;
        for id in existing.iter().filter(|id| !incoming.contains(id)) {
            removed += tx.execute("DELETE FROM issues WHERE id = ?", [id])?;
        }
        let mut changed = 0;
        for issue in incoming.iter() {
            if upsert_in(&tx, issue, false)? {
                changed += 1;
            }
        }
        tx.execute("DELETE FROM dirty_issues", [])?;
        tx.commit()?;

        tracing::debug!(
            records = incoming.len(),
            changed,
            removed,
            "Replaced record set"
        );
        Ok(incoming.len())
    }

    fn dirty_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT issue_id FROM dirty_issues ORDER BY marked_at, issue_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn clear_dirty(&mut self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "DELETE FROM dirty_issues WHERE issue_id IN ({})",
            placeholders.join(",")
        );
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();

        let count = self.conn.execute(&sql, params.as_slice())?;
        Ok(count)
    }

    fn sync_base(&self) -> Result<Option<String>> {
        self.get_metadata(SYNC_BASE_KEY)
    }

    fn set_sync_base(&mut self, commit: &str) -> Result<()> {
        self.set_metadata(SYNC_BASE_KEY, commit)
    }

    fn record_export(&mut self, hash: &str) -> Result<()> {
        self.set_metadata(LAST_EXPORT_HASH_KEY, hash)
    }
}

fn decode(payload: &str) -> Result<Issue> {
    Ok(serde_json::from_str(payload)?)
}

fn mark_dirty(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO dirty_issues (issue_id, marked_at) VALUES (?, ?)",
        rusqlite::params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Write `issue` unless the stored payload is identical.
fn upsert_in(conn: &Connection, issue: &Issue, dirty: bool) -> Result<bool> {
    if let Some(reason) = issue.lifecycle_violation() {
        return Err(BeadsError::validation("status", format!("{}: {reason}", issue.id)));
    }

    let payload = serde_json::to_string(issue)?;
    let stored: Option<String> = conn
        .query_row("SELECT payload FROM issues WHERE id = ?", [&issue.id], |row| {
            row.get(0)
        })
        .optional()?;
    if stored.as_deref() == Some(payload.as_str()) {
        return Ok(false);
    }

    conn.execute(
        "INSERT OR REPLACE INTO issues (id, content_hash, title, status, ephemeral, updated_at, payload)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            issue.id,
            content_hash(issue),
            issue.title,
            issue.status.as_str(),
            issue.ephemeral,
            issue.updated_at.to_rfc3339(),
            payload
        ],
    )?;
    if dirty {
        mark_dirty(conn, &issue.id)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use chrono::{TimeZone, Utc};

    fn issue(id: &str) -> Issue {
        Issue::new(id, format!("Issue {id}"), Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn upsert_marks_dirty_only_on_change() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.upsert_issue(&issue("bd-1")).unwrap());
        assert_eq!(storage.dirty_ids().unwrap(), vec!["bd-1".to_string()]);

        storage.clear_dirty(&["bd-1".to_string()]).unwrap();
        assert!(!storage.upsert_issue(&issue("bd-1")).unwrap());
        assert!(storage.dirty_ids().unwrap().is_empty());
    }

    #[test]
    fn upsert_rejects_lifecycle_violation() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut bad = issue("bd-1");
        bad.status = Status::Closed;
        assert!(storage.upsert_issue(&bad).is_err());
    }

    #[test]
    fn export_excludes_ephemeral_and_keeps_tombstones() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut wisp = issue("bd-2");
        wisp.ephemeral = true;
        let mut gone = issue("bd-3");
        gone.status = Status::Tombstone;
        gone.deleted_at = Some(gone.updated_at);
        gone.original_type = Some("task".to_string());

        storage.upsert_issue(&issue("bd-1")).unwrap();
        storage.upsert_issue(&wisp).unwrap();
        storage.upsert_issue(&gone).unwrap();

        let set = RecordSet::parse(&storage.get_record_set().unwrap(), "test").unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["bd-1", "bd-3"]);
    }

    #[test]
    fn replace_record_set_removes_missing_and_keeps_ephemeral() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut wisp = issue("bd-9");
        wisp.ephemeral = true;
        storage.upsert_issue(&issue("bd-1")).unwrap();
        storage.upsert_issue(&issue("bd-2")).unwrap();
        storage.upsert_issue(&wisp).unwrap();

        let incoming: RecordSet = [issue("bd-2"), issue("bd-3")].into_iter().collect();
        let count = storage
            .replace_record_set(&incoming.to_bytes().unwrap())
            .unwrap();

        assert_eq!(count, 2);
        assert!(storage.get_issue("bd-1").unwrap().is_none());
        assert!(storage.get_issue("bd-3").unwrap().is_some());
        assert!(storage.get_issue("bd-9").unwrap().is_some());
        assert!(storage.dirty_ids().unwrap().is_empty());
    }

    #[test]
    fn replace_record_set_is_atomic_on_parse_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_issue(&issue("bd-1")).unwrap();
        assert!(storage.replace_record_set(b"not json\n").is_err());
        assert_eq!(storage.count_issues().unwrap(), 1);
    }

    #[test]
    fn config_and_metadata_roundtrip() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.set_config("sync.branch", "data").unwrap();
        storage.record_export("abc").unwrap();
        assert_eq!(
            storage.get_config("sync.branch").unwrap().as_deref(),
            Some("data")
        );
        assert_eq!(
            storage.get_metadata(LAST_EXPORT_HASH_KEY).unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(storage.get_all_config().unwrap().len(), 1);

        assert_eq!(storage.sync_base().unwrap(), None);
        storage.set_sync_base("abc123").unwrap();
        assert_eq!(storage.sync_base().unwrap().as_deref(), Some("abc123"));
    }
}
