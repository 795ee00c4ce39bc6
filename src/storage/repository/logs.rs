// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only device log entries and usage aggregation.
//!
//! Entries are immutable once written. Reads go through the
//! `DEVICE_LOG_INDEX` composite key (`device_id | !timestamp | entry_id`),
//! which keeps a forward range scan in newest-first order and makes both
//! "recent N" and "entries in window" single range reads.
//!
//! Ownership is not checked here. Callers resolve the device through
//! `DeviceRepository` first; this repository only scopes by device id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::db::{
    make_index_key, make_prefix, make_prefix_end, make_window_end, make_window_start, FleetDb,
    DEVICE_LOG_INDEX, LOGS,
};
use super::super::StoreResult;

/// Event name that contributes to usage totals.
pub const USAGE_EVENT: &str = "units_consumed";

/// A single telemetry event reported by a device.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    pub id: Uuid,
    pub device_id: Uuid,
    /// Free-form event name, e.g. `units_consumed`
    pub event: String,
    /// Numeric payload; absent for events that carry none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// The moment the event happened on the device
    pub timestamp: DateTime<Utc>,
    /// The moment the entry was ingested
    pub created_at: DateTime<Utc>,
}

/// Repository for device log entries.
pub struct LogRepository<'a> {
    db: &'a FleetDb,
}

impl<'a> LogRepository<'a> {
    pub fn new(db: &'a FleetDb) -> Self {
        Self { db }
    }

    /// Append an entry for `device_id`. When the reporter supplies no
    /// timestamp the ingestion time is used.
    pub fn append(
        &self,
        device_id: Uuid,
        event: String,
        value: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<LogEntry> {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            device_id,
            event,
            value,
            timestamp: timestamp.unwrap_or(now),
            created_at: now,
        };
        let entry_id = entry.id.to_string();
        let json = serde_json::to_vec(&entry)?;
        let index_key = make_index_key(
            &device_id.to_string(),
            entry.timestamp.timestamp_millis(),
            &entry_id,
        );

        let write_txn = self.db.begin_write()?;
        {
            let mut logs = write_txn.open_table(LOGS)?;
            logs.insert(entry_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(DEVICE_LOG_INDEX)?;
            index.insert(index_key.as_slice(), entry_id.as_str())?;
        }
        write_txn.commit()?;

        Ok(entry)
    }

    /// The most recent `limit` entries for `device_id`, newest first.
    pub fn recent(&self, device_id: Uuid, limit: usize) -> StoreResult<Vec<LogEntry>> {
        let device_key = device_id.to_string();
        let prefix = make_prefix(&device_key);
        let prefix_end = make_prefix_end(&device_key);

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DEVICE_LOG_INDEX)?;
        let logs_table = read_txn.open_table(LOGS)?;

        let mut entries = Vec::new();
        for item in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            if entries.len() >= limit {
                break;
            }
            let item = item?;
            let entry_id = item.1.value();
            if let Some(value) = logs_table.get(entry_id)? {
                entries.push(serde_json::from_slice(value.value())?);
            }
        }

        Ok(entries)
    }

    /// Sum of `value` over `units_consumed` entries with a timestamp in
    /// `[from, to]`, both ends inclusive. Entries without a value count
    /// as zero; no matching entries yield 0.0.
    pub fn total_usage(
        &self,
        device_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<f64> {
        let device_key = device_id.to_string();
        // Keys are newest-first, so the scan starts at `to` and ends at `from`.
        let start = make_window_start(&device_key, to.timestamp_millis());
        let end = make_window_end(&device_key, from.timestamp_millis());

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DEVICE_LOG_INDEX)?;
        let logs_table = read_txn.open_table(LOGS)?;

        let mut total = 0.0;
        for item in index.range(start.as_slice()..end.as_slice())? {
            let item = item?;
            let entry_id = item.1.value();
            if let Some(value) = logs_table.get(entry_id)? {
                let entry: LogEntry = serde_json::from_slice(value.value())?;
                // Index keys carry millisecond precision; re-check exactly.
                if entry.event == USAGE_EVENT
                    && entry.timestamp >= from
                    && entry.timestamp <= to
                {
                    total += entry.value.unwrap_or(0.0);
                }
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_db() -> (FleetDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = FleetDb::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn append_usage(
        repo: &LogRepository<'_>,
        device: Uuid,
        value: f64,
        at: DateTime<Utc>,
    ) -> LogEntry {
        repo.append(device, USAGE_EVENT.to_string(), Some(value), Some(at), at)
            .unwrap()
    }

    #[test]
    fn append_defaults_timestamp_to_ingestion_time() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let now = Utc::now();

        let entry = repo
            .append(device, "boot".to_string(), None, None, now)
            .unwrap();
        assert_eq!(entry.timestamp, now);
        assert_eq!(entry.created_at, now);
        assert!(entry.value.is_none());
    }

    #[test]
    fn recent_returns_newest_first_and_respects_limit() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let base = Utc::now();

        for i in 0..5 {
            repo.append(
                device,
                format!("event-{i}"),
                None,
                Some(base + Duration::seconds(i)),
                base,
            )
            .unwrap();
        }

        let entries = repo.recent(device, 3).unwrap();
        assert_eq!(entries.len(), 3);
        let events: Vec<_> = entries.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["event-4", "event-3", "event-2"]);
    }

    #[test]
    fn recent_is_device_scoped() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        repo.append(device, "mine".to_string(), None, None, now)
            .unwrap();
        repo.append(other, "theirs".to_string(), None, None, now)
            .unwrap();

        let entries = repo.recent(device, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "mine");
    }

    #[test]
    fn recent_for_unknown_device_is_empty() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        assert!(repo.recent(Uuid::new_v4(), 10).unwrap().is_empty());
    }

    #[test]
    fn usage_sums_only_entries_inside_window() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let now = Utc::now();

        // Five units recently, seven units thirty hours ago
        for _ in 0..5 {
            append_usage(&repo, device, 1.0, now - Duration::hours(1));
        }
        for _ in 0..7 {
            append_usage(&repo, device, 1.0, now - Duration::hours(30));
        }

        let day = repo
            .total_usage(device, now - Duration::hours(24), now)
            .unwrap();
        assert_eq!(day, 5.0);

        let week = repo
            .total_usage(device, now - Duration::days(7), now)
            .unwrap();
        assert_eq!(week, 12.0);
    }

    #[test]
    fn usage_ignores_other_events_and_devices() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        append_usage(&repo, device, 3.5, now);
        append_usage(&repo, other, 100.0, now);
        repo.append(
            device,
            "temperature".to_string(),
            Some(21.0),
            Some(now),
            now,
        )
        .unwrap();

        let total = repo
            .total_usage(device, now - Duration::hours(24), now)
            .unwrap();
        assert_eq!(total, 3.5);
    }

    #[test]
    fn usage_treats_missing_value_as_zero() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let now = Utc::now();

        append_usage(&repo, device, 2.0, now);
        repo.append(device, USAGE_EVENT.to_string(), None, Some(now), now)
            .unwrap();

        let total = repo
            .total_usage(device, now - Duration::hours(24), now)
            .unwrap();
        assert_eq!(total, 2.0);
    }

    #[test]
    fn usage_with_no_entries_is_zero() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let total = repo
            .total_usage(Uuid::new_v4(), Utc::now() - Duration::hours(24), Utc::now())
            .unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn usage_window_is_inclusive_at_both_ends() {
        let (db, _dir) = temp_db();
        let repo = LogRepository::new(&db);
        let device = Uuid::new_v4();
        let now = Utc::now();
        let from = now - Duration::hours(24);

        append_usage(&repo, device, 1.0, from);
        append_usage(&repo, device, 10.0, now);
        append_usage(&repo, device, 100.0, from - Duration::milliseconds(1));

        let total = repo.total_usage(device, from, now).unwrap();
        assert_eq!(total, 11.0);
    }
}
