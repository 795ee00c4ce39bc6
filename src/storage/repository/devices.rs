// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device repository and the device status lifecycle.
//!
//! Every mutation is owner-scoped: the `(id, owner_id)` match happens inside
//! the same write transaction as the write itself, so ownership cannot change
//! between check and mutation. The one exception is `deactivate_stale`, the
//! store-wide administrative sweep used by the reaper.
//!
//! Status is a closed enum with unrestricted transitions. The invariant is
//! who may cause a transition (the owner, or the reaper for staleness), not
//! which transitions are legal.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::db::{
    make_index_key, make_prefix, make_prefix_end, FleetDb, DEVICES, OWNER_DEVICE_INDEX,
};
use super::super::ownership::{ensure_owned, OwnedResource};
use super::super::StoreResult;

/// Device lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device is reporting and in service
    Active,
    /// Device is idle or has been retired by the staleness sweep
    Inactive,
    /// Device reported or was flagged as faulty
    Faulty,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

/// Device category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Thermostat,
    Meter,
    Camera,
    Other,
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::Other
    }
}

/// Stored device record, also returned to API clients as-is.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Device {
    pub id: Uuid,
    /// Owning user; immutable after creation
    pub owner_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    /// Last heartbeat time; null until the first heartbeat
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for Device {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn resource_kind() -> &'static str {
        "Device"
    }
}

/// Partial update applied by `DeviceRepository::update`.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.device_type.is_none() && self.status.is_none()
    }
}

/// Repository for device records.
pub struct DeviceRepository<'a> {
    db: &'a FleetDb,
}

impl<'a> DeviceRepository<'a> {
    pub fn new(db: &'a FleetDb) -> Self {
        Self { db }
    }

    /// Create a device owned by `owner_id`. The store assigns id and timestamps.
    pub fn create(
        &self,
        owner_id: Uuid,
        name: String,
        device_type: DeviceType,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let device = Device {
            id: Uuid::new_v4(),
            owner_id,
            // Names are stored trimmed; length rules apply to the raw input.
            name: name.trim().to_string(),
            device_type,
            status,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        };
        let device_id = device.id.to_string();
        let json = serde_json::to_vec(&device)?;
        let index_key = make_index_key(
            &owner_id.to_string(),
            device.created_at.timestamp_millis(),
            &device_id,
        );

        let write_txn = self.db.begin_write()?;
        {
            let mut devices = write_txn.open_table(DEVICES)?;
            devices.insert(device_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(OWNER_DEVICE_INDEX)?;
            index.insert(index_key.as_slice(), device_id.as_str())?;
        }
        write_txn.commit()?;

        Ok(device)
    }

    /// List devices owned by `owner_id`, newest first, with optional
    /// equality filters on type and status.
    pub fn list_by_owner(
        &self,
        owner_id: Uuid,
        type_filter: Option<DeviceType>,
        status_filter: Option<DeviceStatus>,
    ) -> StoreResult<Vec<Device>> {
        let owner_key = owner_id.to_string();
        let prefix = make_prefix(&owner_key);
        let prefix_end = make_prefix_end(&owner_key);

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OWNER_DEVICE_INDEX)?;
        let devices_table = read_txn.open_table(DEVICES)?;

        let mut devices = Vec::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            let device_id = entry.1.value();
            if let Some(value) = devices_table.get(device_id)? {
                let device: Device = serde_json::from_slice(value.value())?;
                if type_filter.is_some_and(|t| device.device_type != t) {
                    continue;
                }
                if status_filter.is_some_and(|s| device.status != s) {
                    continue;
                }
                devices.push(device);
            }
        }

        Ok(devices)
    }

    /// Fetch a device if it exists and is owned by `owner_id`.
    ///
    /// Missing and not-owned both yield the same `NotFound`.
    pub fn get_owned(&self, owner_id: Uuid, device_id: Uuid) -> StoreResult<Device> {
        let read_txn = self.db.begin_read()?;
        let devices = read_txn.open_table(DEVICES)?;

        let existing = match devices.get(device_id.to_string().as_str())? {
            Some(value) => Some(serde_json::from_slice::<Device>(value.value())?),
            None => None,
        };
        ensure_owned(existing, owner_id)
    }

    /// Ownership guard for log- and usage-scoped operations.
    pub fn assert_owner(&self, owner_id: Uuid, device_id: Uuid) -> StoreResult<()> {
        self.get_owned(owner_id, device_id).map(|_| ())
    }

    /// Apply a partial update to an owned device.
    ///
    /// An empty patch is a plain touch: it bumps `updated_at` and returns
    /// the device unchanged.
    pub fn update(
        &self,
        owner_id: Uuid,
        device_id: Uuid,
        patch: DevicePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        self.mutate_owned(owner_id, device_id, now, move |device| {
            if let Some(name) = patch.name {
                device.name = name.trim().to_string();
            }
            if let Some(device_type) = patch.device_type {
                device.device_type = device_type;
            }
            if let Some(status) = patch.status {
                device.status = status;
            }
        })
    }

    /// Record a heartbeat: advance `last_active_at` and optionally set status.
    pub fn heartbeat(
        &self,
        owner_id: Uuid,
        device_id: Uuid,
        status: Option<DeviceStatus>,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        self.mutate_owned(owner_id, device_id, now, move |device| {
            device.last_active_at = Some(now);
            if let Some(status) = status {
                device.status = status;
            }
        })
    }

    /// Hard-delete an owned device.
    ///
    /// Log entries are intentionally not cascaded: history stays in the
    /// store but becomes unreachable through owner-scoped queries.
    pub fn delete(&self, owner_id: Uuid, device_id: Uuid) -> StoreResult<()> {
        let id_key = device_id.to_string();

        let write_txn = self.db.begin_write()?;
        {
            let mut devices = write_txn.open_table(DEVICES)?;

            let existing = match devices.get(id_key.as_str())? {
                Some(value) => Some(serde_json::from_slice::<Device>(value.value())?),
                None => None,
            };
            let device = ensure_owned(existing, owner_id)?;

            devices.remove(id_key.as_str())?;

            let index_key = make_index_key(
                &owner_id.to_string(),
                device.created_at.timestamp_millis(),
                &id_key,
            );
            let mut index = write_txn.open_table(OWNER_DEVICE_INDEX)?;
            index.remove(index_key.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Store-wide staleness sweep: set `status = inactive` on every device
    /// whose `last_active_at` is at or before `threshold`. A device that has
    /// never reported (`last_active_at` null) always counts as stale.
    ///
    /// Idempotent: already-inactive devices are skipped. Returns the number
    /// of devices transitioned.
    pub fn deactivate_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let transitioned = {
            let mut devices = write_txn.open_table(DEVICES)?;

            let mut stale = Vec::new();
            for entry in devices.range::<&str>(..)? {
                let entry = entry?;
                let device: Device = serde_json::from_slice(entry.1.value())?;
                let is_stale = device.last_active_at.is_none_or(|t| t <= threshold);
                if is_stale && device.status != DeviceStatus::Inactive {
                    stale.push(device);
                }
            }

            for device in &mut stale {
                device.status = DeviceStatus::Inactive;
                device.updated_at = now;
                let json = serde_json::to_vec(device)?;
                devices.insert(device.id.to_string().as_str(), json.as_slice())?;
            }
            stale.len()
        };
        write_txn.commit()?;

        Ok(transitioned)
    }

    /// Ownership-checked read-modify-write inside one write transaction.
    fn mutate_owned(
        &self,
        owner_id: Uuid,
        device_id: Uuid,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Device),
    ) -> StoreResult<Device> {
        let id_key = device_id.to_string();

        let write_txn = self.db.begin_write()?;
        let device = {
            let mut devices = write_txn.open_table(DEVICES)?;

            let existing = match devices.get(id_key.as_str())? {
                Some(value) => Some(serde_json::from_slice::<Device>(value.value())?),
                None => None,
            };
            let mut device = ensure_owned(existing, owner_id)?;

            apply(&mut device);
            device.updated_at = now;

            let json = serde_json::to_vec(&device)?;
            devices.insert(id_key.as_str(), json.as_slice())?;
            device
        };
        write_txn.commit()?;

        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;
    use chrono::Duration;

    fn temp_db() -> (FleetDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = FleetDb::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn create_device(repo: &DeviceRepository<'_>, owner: Uuid, name: &str) -> Device {
        repo.create(
            owner,
            name.to_string(),
            DeviceType::Meter,
            DeviceStatus::Active,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_assigns_id_and_defaults() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();

        let device = repo
            .create(
                owner,
                "Hall sensor".to_string(),
                DeviceType::default(),
                DeviceStatus::default(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(device.owner_id, owner);
        assert_eq!(device.device_type, DeviceType::Other);
        assert_eq!(device.status, DeviceStatus::Inactive);
        assert!(device.last_active_at.is_none());

        let loaded = repo.get_owned(owner, device.id).unwrap();
        assert_eq!(loaded.name, "Hall sensor");
    }

    #[test]
    fn list_is_owner_scoped_and_newest_first() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let base = Utc::now();
        for i in 0..3 {
            repo.create(
                owner,
                format!("device-{i}"),
                DeviceType::Light,
                DeviceStatus::Active,
                base + Duration::seconds(i),
            )
            .unwrap();
        }
        create_device(&repo, other, "not-mine");

        let devices = repo.list_by_owner(owner, None, None).unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices.iter().all(|d| d.owner_id == owner));

        // Newest creation first
        let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["device-2", "device-1", "device-0"]);
    }

    #[test]
    fn list_filters_by_type_and_status() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();

        repo.create(
            owner,
            "lamp".to_string(),
            DeviceType::Light,
            DeviceStatus::Active,
            Utc::now(),
        )
        .unwrap();
        repo.create(
            owner,
            "meter".to_string(),
            DeviceType::Meter,
            DeviceStatus::Inactive,
            Utc::now(),
        )
        .unwrap();

        let lights = repo
            .list_by_owner(owner, Some(DeviceType::Light), None)
            .unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].name, "lamp");

        let inactive = repo
            .list_by_owner(owner, None, Some(DeviceStatus::Inactive))
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].name, "meter");

        let none = repo
            .list_by_owner(owner, Some(DeviceType::Camera), None)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn foreign_device_is_indistinguishable_from_missing() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let device = create_device(&repo, owner, "mine");
        let missing_id = Uuid::new_v4();

        for (user, id) in [(stranger, device.id), (owner, missing_id)] {
            assert!(matches!(
                repo.get_owned(user, id),
                Err(StoreError::NotFound(_))
            ));
            assert!(matches!(
                repo.update(user, id, DevicePatch::default(), Utc::now()),
                Err(StoreError::NotFound(_))
            ));
            assert!(matches!(
                repo.heartbeat(user, id, None, Utc::now()),
                Err(StoreError::NotFound(_))
            ));
            assert!(matches!(
                repo.delete(user, id),
                Err(StoreError::NotFound(_))
            ));
        }

        // The device itself is untouched by the failed attempts
        let loaded = repo.get_owned(owner, device.id).unwrap();
        assert_eq!(loaded.name, "mine");
    }

    #[test]
    fn update_applies_partial_patch() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let device = create_device(&repo, owner, "old-name");

        let patch = DevicePatch {
            name: Some("new-name".to_string()),
            device_type: None,
            status: Some(DeviceStatus::Faulty),
        };
        let later = Utc::now() + Duration::seconds(5);
        let updated = repo.update(owner, device.id, patch, later).unwrap();

        assert_eq!(updated.name, "new-name");
        assert_eq!(updated.device_type, DeviceType::Meter);
        assert_eq!(updated.status, DeviceStatus::Faulty);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, device.created_at);
    }

    #[test]
    fn names_are_stored_trimmed() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();

        let device = create_device(&repo, owner, "  Hall sensor  ");
        assert_eq!(device.name, "Hall sensor");

        let patch = DevicePatch {
            name: Some("  renamed  ".to_string()),
            device_type: None,
            status: None,
        };
        let updated = repo.update(owner, device.id, patch, Utc::now()).unwrap();
        assert_eq!(updated.name, "renamed");
    }

    #[test]
    fn empty_patch_is_a_touch() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let device = create_device(&repo, owner, "sensor");

        let later = device.updated_at + Duration::seconds(10);
        let touched = repo
            .update(owner, device.id, DevicePatch::default(), later)
            .unwrap();

        assert_eq!(touched.name, device.name);
        assert_eq!(touched.status, device.status);
        assert_eq!(touched.updated_at, later);
    }

    #[test]
    fn heartbeat_advances_last_active_and_sets_status() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let device = create_device(&repo, owner, "sensor");
        assert!(repo.get_owned(owner, device.id).unwrap().last_active_at.is_none());

        let t1 = Utc::now();
        let beat = repo
            .heartbeat(owner, device.id, Some(DeviceStatus::Faulty), t1)
            .unwrap();
        assert_eq!(beat.last_active_at, Some(t1));
        assert_eq!(beat.status, DeviceStatus::Faulty);

        // A later heartbeat without a status keeps the status
        let t2 = t1 + Duration::seconds(30);
        let beat2 = repo.heartbeat(owner, device.id, None, t2).unwrap();
        assert_eq!(beat2.last_active_at, Some(t2));
        assert_eq!(beat2.status, DeviceStatus::Faulty);
    }

    #[test]
    fn delete_removes_device_and_listing() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let device = create_device(&repo, owner, "doomed");

        repo.delete(owner, device.id).unwrap();

        assert!(matches!(
            repo.get_owned(owner, device.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(repo.list_by_owner(owner, None, None).unwrap().is_empty());

        // Deleting again reports NotFound
        assert!(matches!(
            repo.delete(owner, device.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn stale_sweep_respects_threshold() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let threshold = now - Duration::hours(24);

        let stale = create_device(&repo, owner, "stale");
        repo.heartbeat(owner, stale.id, None, now - Duration::hours(25))
            .unwrap();

        let fresh = create_device(&repo, owner, "fresh");
        repo.heartbeat(owner, fresh.id, None, now - Duration::hours(23))
            .unwrap();

        // Never reported at all: null last_active_at counts as stale
        let silent = create_device(&repo, owner, "silent");

        let transitioned = repo.deactivate_stale(threshold, now).unwrap();
        assert_eq!(transitioned, 2);

        assert_eq!(
            repo.get_owned(owner, stale.id).unwrap().status,
            DeviceStatus::Inactive
        );
        assert_eq!(
            repo.get_owned(owner, silent.id).unwrap().status,
            DeviceStatus::Inactive
        );
        assert_eq!(
            repo.get_owned(owner, fresh.id).unwrap().status,
            DeviceStatus::Active
        );
    }

    #[test]
    fn stale_sweep_is_idempotent() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let threshold = now - Duration::hours(24);

        create_device(&repo, owner, "silent-1");
        create_device(&repo, owner, "silent-2");

        assert_eq!(repo.deactivate_stale(threshold, now).unwrap(), 2);
        // Second sweep with no intervening heartbeats changes nothing
        assert_eq!(repo.deactivate_stale(threshold, now).unwrap(), 0);
    }

    #[test]
    fn stale_sweep_covers_all_owners() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let now = Utc::now();
        let threshold = now - Duration::hours(24);

        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();
        create_device(&repo, owner_a, "a");
        create_device(&repo, owner_b, "b");

        assert_eq!(repo.deactivate_stale(threshold, now).unwrap(), 2);
        assert_eq!(
            repo.list_by_owner(owner_a, None, Some(DeviceStatus::Inactive))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            repo.list_by_owner(owner_b, None, Some(DeviceStatus::Inactive))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn heartbeat_at_threshold_counts_as_stale() {
        let (db, _dir) = temp_db();
        let repo = DeviceRepository::new(&db);
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let threshold = now - Duration::hours(24);

        let device = create_device(&repo, owner, "edge");
        repo.heartbeat(owner, device.id, None, threshold).unwrap();

        assert_eq!(repo.deactivate_stale(threshold, now).unwrap(), 1);
        assert_eq!(
            repo.get_owned(owner, device.id).unwrap().status,
            DeviceStatus::Inactive
        );
    }
}
