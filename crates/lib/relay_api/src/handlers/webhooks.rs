//! Inbound GitHub webhook deliveries.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use tracing::{info, warn};

use relay_core::github::webhook::verify_signature;
use relay_core::models::event::WebhookEvent;
use relay_core::recording::record_if_active;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{WebhookAcceptedResponse, outcome_name};

const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /webhook`: verify, then record if the installation is recording.
pub async fn receive_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<WebhookAcceptedResponse>)> {
    if let Some(secret) = &state.config.webhook_secret {
        let signature = header(&headers, SIGNATURE_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".into()))?;
        if !verify_signature(secret, signature, &body) {
            warn!("rejected webhook with bad signature");
            return Err(AppError::Unauthorized("Invalid webhook signature".into()));
        }
    }

    let event_name = header(&headers, EVENT_HEADER)
        .ok_or_else(|| AppError::Validation("Missing X-GitHub-Event header".into()))?;
    let delivery = header(&headers, DELIVERY_HEADER)
        .ok_or_else(|| AppError::Validation("Missing X-GitHub-Delivery header".into()))?;
    let payload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON payload: {e}")))?;

    let event = WebhookEvent::from_delivery(event_name, delivery, payload);
    let outcome = record_if_active(state.control.store().as_ref(), &event, Utc::now()).await?;
    info!(event = %event.name, delivery, outcome = outcome_name(outcome), "webhook received");

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAcceptedResponse {
            event: event.name,
            outcome: outcome_name(outcome).to_string(),
        }),
    ))
}
