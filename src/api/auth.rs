// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{hash_password, verify_password, Role},
    error::ApiError,
    state::AppState,
    storage::{PublicUser, UserRepository},
};

use super::{ApiJson, MessageResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to `user` when omitted
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: PublicUser,
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    validate_signup(&request)?;

    let password_hash = hash_password(&request.password)?;
    UserRepository::new(&state.db).create(
        request.name,
        request.email,
        password_hash,
        request.role,
        Utc::now(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_login(&request)?;

    let user = UserRepository::new(&state.db)
        .find_by_email(&request.email)?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let token = state.tokens.issue(user.id, user.role)?;

    Ok(Json(LoginResponse {
        success: true,
        token,
        user: user.into(),
    }))
}

fn validate_signup(request: &SignupRequest) -> Result<(), ApiError> {
    if request.name.chars().count() < 2 {
        return Err(ApiError::bad_request("Name must be at least 2 characters"));
    }
    if !is_valid_email(&request.email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if request.password.chars().count() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

// Credential shape is checked before any lookup, so a malformed login
// attempt is a 400, never a credentials failure.
fn validate_login(request: &LoginRequest) -> Result<(), ApiError> {
    if !is_valid_email(&request.email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if request.password.chars().count() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}
