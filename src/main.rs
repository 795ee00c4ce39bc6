// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleet_server::api;
use fleet_server::api::rate_limit::RateLimiter;
use fleet_server::auth::TokenService;
use fleet_server::config::Config;
use fleet_server::reaper::StaleDeviceReaper;
use fleet_server::state::AppState;
use fleet_server::storage::FleetDb;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = Config::from_env();

    let db = match FleetDb::open(&config.store_path()) {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, path = %config.store_path().display(), "Failed to open store");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(
        db,
        TokenService::new(&config.jwt_secret, config.jwt_expires_in_hours),
        RateLimiter::new(config.rate_limit_per_min),
    );

    let shutdown = CancellationToken::new();
    let reaper = StaleDeviceReaper::new(
        Arc::clone(&state.db),
        config.reaper_interval,
        config.stale_window,
    );
    let reaper_handle = tokio::spawn(reaper.run(shutdown.clone()));

    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(addr, "Fleet server listening (docs at /docs)");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()));

    if let Err(err) = server.await {
        error!(error = %err, "Server failed");
        shutdown.cancel();
        let _ = reaper_handle.await;
        return ExitCode::FAILURE;
    }

    shutdown.cancel();
    let _ = reaper_handle.await;
    info!("Fleet server stopped");
    ExitCode::SUCCESS
}

/// Resolves when Ctrl-C arrives, cancelling the background tasks first.
async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(err) => {
            // Without a signal handler the server runs until killed.
            error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
