// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{DeviceRepository, LogEntry, LogRepository},
};

use super::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLogRequest {
    /// Event name, e.g. `units_consumed`
    pub event: String,
    pub value: Option<f64>,
    /// Defaults to the ingestion time when omitted
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogsQuery {
    /// Number of entries to return (1-100)
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

/// Aggregation window for the usage endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub enum UsageWindow {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
}

impl Default for UsageWindow {
    fn default() -> Self {
        Self::Day
    }
}

impl UsageWindow {
    fn duration(self) -> chrono::Duration {
        match self {
            Self::Day => chrono::Duration::hours(24),
            Self::Week => chrono::Duration::days(7),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UsageQuery {
    #[serde(default)]
    pub range: UsageWindow,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub success: bool,
    pub log: LogEntry,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// Usage total for the requested window; only the field matching the
/// window is present.
#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub success: bool,
    pub device_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_units_last_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_units_last_7d: Option<f64>,
}

#[utoipa::path(
    post,
    path = "/devices/{id}/logs",
    params(("id" = Uuid, Path, description = "Device id")),
    request_body = CreateLogRequest,
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Log entry appended", body = LogResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Device not found")
    )
)]
pub async fn create_log(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateLogRequest>,
) -> Result<(StatusCode, Json<LogResponse>), ApiError> {
    if request.event.is_empty() {
        return Err(ApiError::bad_request("Event must not be empty"));
    }

    DeviceRepository::new(&state.db).assert_owner(user.user_id, device_id)?;
    let log = LogRepository::new(&state.db).append(
        device_id,
        request.event,
        request.value,
        request.timestamp,
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(LogResponse { success: true, log })))
}

#[utoipa::path(
    get,
    path = "/devices/{id}/logs",
    params(("id" = Uuid, Path, description = "Device id"), LogsQuery),
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Most recent log entries, newest first", body = LogsResponse),
        (status = 400, description = "Limit out of range"),
        (status = 404, description = "Device not found")
    )
)]
pub async fn list_logs(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    if query.limit < 1 || query.limit > 100 {
        return Err(ApiError::bad_request("Limit must be between 1 and 100"));
    }

    DeviceRepository::new(&state.db).assert_owner(user.user_id, device_id)?;
    let logs = LogRepository::new(&state.db).recent(device_id, query.limit as usize)?;

    Ok(Json(LogsResponse {
        success: true,
        logs,
    }))
}

#[utoipa::path(
    get,
    path = "/devices/{id}/usage",
    params(("id" = Uuid, Path, description = "Device id"), UsageQuery),
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Total units consumed in the window", body = UsageResponse),
        (status = 404, description = "Device not found")
    )
)]
pub async fn device_usage(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<UsageQuery>,
) -> Result<Json<UsageResponse>, ApiError> {
    DeviceRepository::new(&state.db).assert_owner(user.user_id, device_id)?;

    let now = Utc::now();
    let from = now - query.range.duration();
    let total = LogRepository::new(&state.db).total_usage(device_id, from, now)?;

    let mut response = UsageResponse {
        success: true,
        device_id,
        total_units_last_24h: None,
        total_units_last_7d: None,
    };
    match query.range {
        UsageWindow::Day => response.total_units_last_24h = Some(total),
        UsageWindow::Week => response.total_units_last_7d = Some(total),
    }

    Ok(Json(response))
}
