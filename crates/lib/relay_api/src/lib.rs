//! # relay_api
//!
//! Control-plane HTTP API for Relay.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Duration;
use tower_http::cors::{Any, CorsLayer};

use relay_core::settings::SettingsSource;
use relay_core::storage::InstallationStore;

use crate::config::ApiConfig;
use crate::handlers::{installations, webhooks};
use crate::services::control::ControlService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Control-plane operations over the installation store.
    pub control: ControlService,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn InstallationStore>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        let control = ControlService::new(store, settings, &config.jwt_secret)
            .with_recording_window(Duration::seconds(config.recording_window_secs));
        Self { config, control }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Deliveries are authenticated by signature, not by token.
    let public = Router::new().route("/webhook", post(webhooks::receive_webhook_handler));

    let protected = Router::new()
        .route("/api/me", get(installations::me_handler))
        .route(
            "/api/installations/{iid}",
            get(installations::get_installation_handler)
                .patch(installations::edit_installation_handler),
        )
        .route(
            "/api/installations/{iid}/record",
            post(installations::record_handler),
        )
        .route(
            "/api/installations/{iid}/webhooks",
            get(installations::list_webhooks_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_token));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
