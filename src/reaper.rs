// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Stale Device Reaper
//!
//! Background task that periodically marks silent devices inactive. This
//! keeps fleet status honest even when owners never touch their devices:
//! a device that stops heartbeating is retired server-side.
//!
//! ## Strategy
//!
//! Every `sweep_interval` (default 30 min) the reaper:
//! 1. Computes the staleness threshold `now - stale_window`.
//! 2. Flips every device whose `last_active_at` is at or before the
//!    threshold (or that never reported at all) to `inactive`.
//!
//! The sweep is idempotent, so overlapping or repeated runs are harmless.
//! A failed sweep is logged and skipped; the next tick retries.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::{DeviceRepository, FleetDb};

/// Background reaper that deactivates devices with no recent heartbeat.
pub struct StaleDeviceReaper {
    db: Arc<FleetDb>,
    sweep_interval: Duration,
    stale_window: chrono::Duration,
}

impl StaleDeviceReaper {
    pub fn new(db: Arc<FleetDb>, sweep_interval: Duration, stale_window: chrono::Duration) -> Self {
        Self {
            db,
            sweep_interval,
            stale_window,
        }
    }

    /// Run the reaper loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(reaper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            stale_window_hours = self.stale_window.num_hours(),
            "Stale device reaper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Stale device reaper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Stale device reaper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: deactivate every device past the staleness window.
    fn sweep_step(&self) {
        let now = Utc::now();
        let threshold = now - self.stale_window;

        match DeviceRepository::new(&self.db).deactivate_stale(threshold, now) {
            Ok(0) => {}
            Ok(count) => {
                info!(count, "Stale device reaper: deactivated stale devices");
            }
            Err(e) => {
                warn!(error = %e, "Stale device reaper: sweep failed");
            }
        }
    }
}
