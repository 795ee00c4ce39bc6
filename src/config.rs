// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! `Config` struct holding them. Configuration is loaded from the
//! environment once at startup; unset or unparsable values fall back to
//! their defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `4000` |
//! | `DATA_DIR` | Directory holding the store file | `./data` |
//! | `JWT_SECRET` | HS256 signing secret | `dev-secret-change-me` |
//! | `JWT_EXPIRES_IN_HOURS` | Access token lifetime | `168` (7 days) |
//! | `RATE_LIMIT_PER_MIN` | Requests allowed per client per minute | `100` |
//! | `REAPER_INTERVAL_SECS` | Seconds between staleness sweeps | `1800` |
//! | `STALE_WINDOW_HOURS` | Hours without a heartbeat before a device is stale | `24` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the store directory.
///
/// The redb database file `fleet.redb` lives inside this directory; it is
/// created on first start.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_EXPIRES_IN_HOURS_ENV: &str = "JWT_EXPIRES_IN_HOURS";
pub const RATE_LIMIT_PER_MIN_ENV: &str = "RATE_LIMIT_PER_MIN";
pub const REAPER_INTERVAL_SECS_ENV: &str = "REAPER_INTERVAL_SECS";
pub const STALE_WINDOW_HOURS_ENV: &str = "STALE_WINDOW_HOURS";

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub rate_limit_per_min: u32,
    pub reaper_interval: StdDuration,
    pub stale_window: Duration,
}

impl Config {
    /// Load configuration from the environment, applying defaults.
    pub fn from_env() -> Self {
        Self {
            host: env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env(PORT_ENV, 4000),
            data_dir: env::var(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            jwt_secret: env::var(JWT_SECRET_ENV)
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            jwt_expires_in_hours: parse_env(JWT_EXPIRES_IN_HOURS_ENV, 168),
            rate_limit_per_min: parse_env(RATE_LIMIT_PER_MIN_ENV, 100),
            reaper_interval: StdDuration::from_secs(parse_env(REAPER_INTERVAL_SECS_ENV, 1800)),
            stale_window: Duration::hours(parse_env(STALE_WINDOW_HOURS_ENV, 24)),
        }
    }

    /// Path of the store file inside the data directory.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("fleet.redb")
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Process env is shared across test threads, so only unset vars
    // are exercised here.

    #[test]
    fn parse_env_falls_back_on_missing_or_invalid() {
        assert_eq!(parse_env("FLEET_TEST_UNSET_VAR", 42u16), 42);
    }

    #[test]
    fn store_path_is_inside_data_dir() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 4000,
            data_dir: PathBuf::from("/tmp/fleet-data"),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expires_in_hours: 168,
            rate_limit_per_min: 100,
            reaper_interval: StdDuration::from_secs(1800),
            stale_window: Duration::hours(24),
        };
        assert_eq!(config.store_path(), PathBuf::from("/tmp/fleet-data/fleet.redb"));
    }
}
