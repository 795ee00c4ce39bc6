// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Token failures deliberately collapse into two client-visible cases:
/// no usable token at all, or a token that failed verification for any
/// reason (bad signature, expired, malformed, unknown subject).
#[derive(Debug)]
pub enum AuthError {
    /// No `Authorization: Bearer` header present
    MissingToken,
    /// Token failed verification
    InvalidToken,
    /// Token could not be signed
    TokenCreation,
    /// Password hashing failed
    PasswordHash,
}

#[derive(Serialize)]
struct AuthErrorBody {
    success: bool,
    message: String,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenCreation | AuthError::PasswordHash => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing token"),
            AuthError::InvalidToken => write!(f, "Invalid/Expired token"),
            AuthError::TokenCreation => write!(f, "Failed to issue token"),
            AuthError::PasswordHash => write!(f, "Failed to hash password"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            success: false,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
