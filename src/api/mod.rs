// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, FromRequest, FromRequestParts, Path, Query,
        Request,
    },
    http::{request::Parts, StatusCode},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ApiError, state::AppState};

pub mod auth;
pub mod devices;
pub mod health;
pub mod logs;
pub mod rate_limit;

/// Request body cap, matching the JSON payload limit of 1 MiB.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Generic `{"success": true, "message": "..."}` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// JSON extractor whose rejections use the API error envelope.
///
/// Malformed or mistyped bodies answer 400 instead of axum's default 422,
/// and an over-limit body keeps its 413.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                Err(ApiError::new(status, rejection.body_text()))
            }
        }
    }
}

/// Path extractor whose rejections use the API error envelope.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::new(rejection.status(), rejection.body_text())),
        }
    }
}

/// Query extractor whose rejections use the API error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::new(rejection.status(), rejection.body_text())),
        }
    }
}

/// Unmatched paths answer with the failure envelope, like every other error.
async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route(
            "/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/devices/{id}",
            patch(devices::update_device).delete(devices::delete_device),
        )
        .route("/devices/{id}/heartbeat", post(devices::heartbeat_device))
        .route(
            "/devices/{id}/logs",
            get(logs::list_logs).post(logs::create_log),
        )
        .route("/devices/{id}/usage", get(logs::device_usage))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signup,
        auth::login,
        devices::create_device,
        devices::list_devices,
        devices::update_device,
        devices::delete_device,
        devices::heartbeat_device,
        logs::create_log,
        logs::list_logs,
        logs::device_usage
    ),
    components(
        schemas(
            MessageResponse,
            health::HealthResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            devices::CreateDeviceRequest,
            devices::UpdateDeviceRequest,
            devices::HeartbeatRequest,
            devices::DeviceResponse,
            devices::DevicesResponse,
            devices::HeartbeatResponse,
            logs::CreateLogRequest,
            logs::LogResponse,
            logs::LogsResponse,
            logs::UsageResponse,
            logs::UsageWindow,
            crate::auth::Role,
            crate::storage::Device,
            crate::storage::DeviceStatus,
            crate::storage::DeviceType,
            crate::storage::LogEntry,
            crate::storage::PublicUser
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Signup and login"),
        (name = "Devices", description = "Device registry and lifecycle"),
        (name = "Logs", description = "Device telemetry and usage")
    )
)]
struct ApiDoc;
