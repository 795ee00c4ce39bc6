// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the fleet store.
//!
//! Each repository wraps one entity family and owns its table pair
//! (primary records plus the scoped index). Repositories borrow the
//! database and are constructed per call site; all state lives in redb.

pub mod devices;
pub mod logs;
pub mod users;

pub use devices::{Device, DevicePatch, DeviceRepository, DeviceStatus, DeviceType};
pub use logs::{LogEntry, LogRepository, USAGE_EVENT};
pub use users::{PublicUser, User, UserRepository};
