// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Reads the `Authorization: Bearer <token>` header and verifies the token
/// against the application's token service. Any header that is absent or
/// not in Bearer form is reported as a missing token; a present token that
/// fails verification is reported as invalid.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_devices(
///     Auth(user): Auth,
///     State(state): State<AppState>,
/// ) -> Result<Json<DevicesResponse>, ApiError> {
///     // user.user_id scopes every store query
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?;

        let user = state.tokens.verify(token)?;
        Ok(Auth(user))
    }
}
