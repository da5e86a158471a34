// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Engagement Core Service
//!
//! The engagement and access-control core of a social networking backend:
//! session authentication, per-endpoint-class rate limiting, reaction and
//! poll-vote counters, and notification fan-out.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SESSION_TTL_SECS`: Session time-to-live in seconds (default: 86400)
//! - `RATE_WINDOW_SECS`: Rate-limit window length in seconds (default: 60)
//! - `AUTH_PER_WINDOW`: Auth-class quota per window (default: 5)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use engagement_core::{
    config::Config,
    handlers::{router, AppState},
    store::SystemTimeSource,
    AccessGuard, AdmissionController, EngagementLedger, MemCounterStore, MemEngagementStore,
    MemNotificationStore, MemSessionStore, Notifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        session_ttl_secs = config.session.ttl_secs,
        window_secs = config.rate_limit.window_secs,
        auth_per_window = config.rate_limit.auth_per_window,
        "Starting engagement core"
    );

    // Create application state
    let guard = AccessGuard::new(Arc::new(MemSessionStore::new()));
    let admission = AdmissionController::new(
        Arc::new(MemCounterStore::new()),
        Arc::new(SystemTimeSource),
        config.rate_limit.clone(),
    );
    let notifier = Notifier::new(
        Arc::new(MemNotificationStore::new()),
        config.notification.clone(),
    );
    let ledger = EngagementLedger::new(Arc::new(MemEngagementStore::new()), notifier.clone());

    let state = Arc::new(AppState {
        guard,
        admission,
        ledger,
        notifier,
        config: config.clone(),
    });

    // Spawn rate-window pruning task
    let prune_state = state.clone();
    let prune_interval = config.rate_limit.window_duration();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(prune_interval);
        loop {
            interval.tick().await;
            prune_state.admission.prune_stale().await;
        }
    });

    // Build router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    Config {
        bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        session: engagement_core::config::SessionConfig {
            ttl_secs: std::env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
        },
        rate_limit: engagement_core::config::RateLimitConfig {
            window_secs: std::env::var("RATE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            auth_per_window: std::env::var("AUTH_PER_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            ..Default::default()
        },
        ..Default::default()
    }
}
