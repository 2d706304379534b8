//! Storage collaborator for the sync engine.
//!
//! The engine sees storage only through [`RecordStore`]: it reads the current
//! exported record set and writes back an imported or merged one.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::Result;

/// What the sync engine needs from a record store.
pub trait RecordStore {
    /// Serialized record set for export, sorted by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_record_set(&self) -> Result<Vec<u8>>;

    /// Replace the exported records with `bytes`, returning the record count.
    ///
    /// Records absent from `bytes` are removed. Ephemeral records, which are
    /// never exported, are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` does not parse or the write fails. The
    /// store is unchanged on error.
    fn replace_record_set(&mut self, bytes: &[u8]) -> Result<usize>;

    /// IDs changed since the last flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn dirty_ids(&self) -> Result<Vec<String>>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn clear_dirty(&mut self, ids: &[String]) -> Result<usize>;

    /// Sync-branch commit whose content the store last matched.
    ///
    /// `None` before the first sync. Serves as the merge base when the branch
    /// moved on without this store seeing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn sync_base(&self) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_sync_base(&mut self, commit: &str) -> Result<()>;

    /// Remember the hash of the last record set written out.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn record_export(&mut self, _hash: &str) -> Result<()> {
        Ok(())
    }
}
