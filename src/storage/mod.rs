// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Fleet Storage Module
//!
//! Persistent storage backed by a single [redb](https://docs.rs/redb) file.
//! redb gives us ACID transactions with MVCC, so the store is the
//! serialization point for every mutation: no in-process locks, and
//! concurrent writers are ordered by their write transactions.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/fleet.redb
//!   users              user_id -> User (JSON)
//!   user_email_index   lowercased email -> user_id
//!   devices            device_id -> Device (JSON)
//!   owner_device_index owner_id | !created_at | device_id -> device_id
//!   logs               entry_id -> LogEntry (JSON)
//!   device_log_index   device_id | !timestamp | entry_id -> entry_id
//! ```
//!
//! ## Access Model
//!
//! - Records are serialized as JSON; indexes hold composite binary keys
//!   with an inverted timestamp so forward scans read newest-first
//! - Every owner-scoped mutation matches `(id, owner_id)` inside the same
//!   write transaction that performs the write
//! - Missing and not-owned are reported identically as `NotFound`

pub mod db;
pub mod ownership;
pub mod repository;

pub use db::{FleetDb, StoreError, StoreResult};
pub use ownership::{ensure_owned, OwnedResource};
pub use repository::{
    Device, DevicePatch, DeviceRepository, DeviceStatus, DeviceType, LogEntry, LogRepository,
    PublicUser, User, UserRepository, USAGE_EVENT,
};
