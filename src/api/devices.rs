// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{Device, DevicePatch, DeviceRepository, DeviceStatus, DeviceType},
};

use super::{ApiJson, ApiPath, ApiQuery, MessageResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDeviceRequest {
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub status: DeviceStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDevicesQuery {
    /// Filter by device type
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    /// Filter by lifecycle status
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct HeartbeatRequest {
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceResponse {
    pub success: bool,
    pub device: Device,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<Device>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub message: String,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/devices",
    request_body = CreateDeviceRequest,
    tag = "Devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Device registered", body = DeviceResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_device(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<DeviceResponse>), ApiError> {
    validate_name(&request.name)?;

    let device = DeviceRepository::new(&state.db).create(
        user.user_id,
        request.name,
        request.device_type,
        request.status,
        Utc::now(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(DeviceResponse {
            success: true,
            device,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/devices",
    params(ListDevicesQuery),
    tag = "Devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Devices owned by the caller", body = DevicesResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_devices(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListDevicesQuery>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let devices = DeviceRepository::new(&state.db).list_by_owner(
        user.user_id,
        query.device_type,
        query.status,
    )?;

    Ok(Json(DevicesResponse {
        success: true,
        devices,
    }))
}

#[utoipa::path(
    patch,
    path = "/devices/{id}",
    params(("id" = Uuid, Path, description = "Device id")),
    request_body = UpdateDeviceRequest,
    tag = "Devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Device updated", body = DeviceResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Device not found")
    )
)]
pub async fn update_device(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateDeviceRequest>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let patch = DevicePatch {
        name: request.name,
        device_type: request.device_type,
        status: request.status,
    };
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }

    let device =
        DeviceRepository::new(&state.db).update(user.user_id, device_id, patch, Utc::now())?;

    Ok(Json(DeviceResponse {
        success: true,
        device,
    }))
}

#[utoipa::path(
    delete,
    path = "/devices/{id}",
    params(("id" = Uuid, Path, description = "Device id")),
    tag = "Devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Device removed", body = MessageResponse),
        (status = 404, description = "Device not found")
    )
)]
pub async fn delete_device(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    DeviceRepository::new(&state.db).delete(user.user_id, device_id)?;
    Ok(Json(MessageResponse::new("Device removed")))
}

#[utoipa::path(
    post,
    path = "/devices/{id}/heartbeat",
    params(("id" = Uuid, Path, description = "Device id")),
    request_body = HeartbeatRequest,
    tag = "Devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Heartbeat recorded", body = HeartbeatResponse),
        (status = 404, description = "Device not found")
    )
)]
pub async fn heartbeat_device(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    // The body is optional; an absent or empty body means a bare heartbeat.
    let request: HeartbeatRequest = if body.is_empty() {
        HeartbeatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request(format!("Invalid request body: {err}")))?
    };

    let device = DeviceRepository::new(&state.db).heartbeat(
        user.user_id,
        device_id,
        request.status,
        Utc::now(),
    )?;

    Ok(Json(HeartbeatResponse {
        success: true,
        message: "Device heartbeat recorded".to_string(),
        last_active_at: device.last_active_at,
    }))
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.chars().count() < 2 {
        return Err(ApiError::bad_request("Name must be at least 2 characters"));
    }
    Ok(())
}
