// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::TokenService;
use crate::storage::FleetDb;

/// Shared application state, cheap to clone into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<FleetDb>,
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: FleetDb, tokens: TokenService, limiter: RateLimiter) -> Self {
        Self {
            db: Arc::new(db),
            tokens: Arc::new(tokens),
            limiter: Arc::new(limiter),
        }
    }
}
