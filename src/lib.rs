// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fleet Server - Multi-tenant device fleet backend
//!
//! This crate provides a device registry with per-user ownership scoping,
//! heartbeat tracking with a background staleness reaper, append-only
//! device logs and windowed usage aggregation, all persisted in a single
//! redb file.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Signup/login, JWT issuance and the `Auth` extractor
//! - `storage` - redb-backed repositories for users, devices and logs
//! - `reaper` - Background sweep marking silent devices inactive

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod reaper;
pub mod state;
pub mod storage;
