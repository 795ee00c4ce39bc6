// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded fleet database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized User
//! - `user_email_index`: lowercase email → user_id
//! - `devices`: device_id → serialized Device
//! - `owner_device_index`: composite key (owner_id|!created_at|device_id) → device_id
//! - `logs`: log_id → serialized LogEntry
//! - `device_log_index`: composite key (device_id|!timestamp|log_id) → log_id
//!
//! The inverted-timestamp composite keys make "newest first" listings and
//! bounded time-window scans plain forward range scans over the index
//! tables. Every multi-step mutation (record + index, conditional update,
//! delete + index removal) runs inside a single write transaction, so the
//! database itself is the serialization point for concurrent callers.

use std::path::Path;

use redb::{Database, ReadTransaction, ReadableDatabase, TableDefinition, WriteTransaction};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized User (JSON bytes).
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: lowercase email → user_id.
pub(crate) const USER_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_email_index");

/// Primary table: device_id → serialized Device (JSON bytes).
pub(crate) const DEVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("devices");

/// Index: composite key → device_id.
/// Key format: `owner_id|!created_at_be|device_id` for descending-time range scans.
pub(crate) const OWNER_DEVICE_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("owner_device_index");

/// Primary table: log_id → serialized LogEntry (JSON bytes).
pub(crate) const LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("logs");

/// Index: composite key → log_id.
/// Key format: `device_id|!timestamp_be|log_id` for descending-time range scans.
pub(crate) const DEVICE_LOG_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("device_log_index");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Encode a millisecond timestamp so byte order equals descending time order.
///
/// The sign bit is flipped first so pre-epoch timestamps order below
/// positive ones, then all bits are inverted for newest-first scans.
fn encode_ts_desc(timestamp_ms: i64) -> [u8; 8] {
    (!((timestamp_ms as u64) ^ (1u64 << 63))).to_be_bytes()
}

/// Build a composite key for a timestamp-ordered index table.
///
/// Format: `scope_id | inverted_timestamp_be_bytes | entry_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(crate) fn make_index_key(scope_id: &str, timestamp_ms: i64, entry_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(scope_id.len() + 1 + 8 + 1 + entry_id.len());
    key.extend_from_slice(scope_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&encode_ts_desc(timestamp_ms));
    key.push(b'|');
    key.extend_from_slice(entry_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all entries under a scope id.
pub(crate) fn make_prefix(scope_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(scope_id.len() + 1);
    prefix.extend_from_slice(scope_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan (prefix with all 0xFF bytes appended).
pub(crate) fn make_prefix_end(scope_id: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(scope_id.len() + 1 + 20);
    end.extend_from_slice(scope_id.as_bytes());
    end.push(b'|');
    // Append enough 0xFF bytes to be past any valid key with this prefix
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Start bound (inclusive) for a window scan: keys at or after the newest
/// timestamp in the window.
pub(crate) fn make_window_start(scope_id: &str, newest_ms: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(scope_id.len() + 1 + 8);
    key.extend_from_slice(scope_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&encode_ts_desc(newest_ms));
    key
}

/// End bound (exclusive) for a window scan: past every key carrying the
/// oldest timestamp in the window.
pub(crate) fn make_window_end(scope_id: &str, oldest_ms: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(scope_id.len() + 1 + 8 + 1 + 20);
    key.extend_from_slice(scope_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&encode_ts_desc(oldest_ms));
    key.extend_from_slice(&[0xFF; 20]);
    key
}

// =============================================================================
// FleetDb
// =============================================================================

/// Embedded ACID database holding users, devices and event logs.
pub struct FleetDb {
    db: Database,
}

impl FleetDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(DEVICES)?;
            let _ = write_txn.open_table(OWNER_DEVICE_INDEX)?;
            let _ = write_txn.open_table(LOGS)?;
            let _ = write_txn.open_table(DEVICE_LOG_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn begin_read(&self) -> Result<ReadTransaction, redb::TransactionError> {
        self.db.begin_read()
    }

    pub(crate) fn begin_write(&self) -> Result<WriteTransaction, redb::TransactionError> {
        self.db.begin_write()
    }
}

// =============================================================================
// Tests
// =============================================================================
