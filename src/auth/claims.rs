// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;

/// Claims carried by an access token issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id
    pub sub: String,
    /// User's role at issue time
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
        }
    }
}

/// Authenticated caller extracted from a verified token.
///
/// This is the identity every owner-scoped operation runs under. The role
/// is informational; device access is decided by ownership alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Build from verified claims. Fails when `sub` is not a UUID.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let user_id = Uuid::parse_str(&claims.sub).ok()?;
        Some(Self {
            user_id,
            role: claims.role,
        })
    }
}
