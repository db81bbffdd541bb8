//! Installation control-plane handlers.
//!
//! Thin wrappers: all authorization happens in `ControlService`.

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CallerToken;
use crate::models::{
    EditInstallationRequest, InstallationResponse, RecordedWebhookListResponse, ViewerResponse,
};

/// `GET /api/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
) -> AppResult<Json<ViewerResponse>> {
    let viewer = state.control.me(&token).await?;
    Ok(Json(viewer.into()))
}

/// `GET /api/installations/{iid}`
pub async fn get_installation_handler(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Path(iid): Path<i64>,
) -> AppResult<Json<InstallationResponse>> {
    let installation = state
        .control
        .installation(&token, iid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("installation {iid}")))?;
    Ok(Json(installation.into()))
}

/// `PATCH /api/installations/{iid}`
pub async fn edit_installation_handler(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Path(iid): Path<i64>,
    Json(body): Json<EditInstallationRequest>,
) -> AppResult<Json<InstallationResponse>> {
    let settings_url = body.settings_url.filter(|u| !u.trim().is_empty());
    let installation = state
        .control
        .edit_installation(&token, iid, settings_url)
        .await?;
    Ok(Json(installation.into()))
}

/// `POST /api/installations/{iid}/record`
pub async fn record_handler(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Path(iid): Path<i64>,
) -> AppResult<Json<InstallationResponse>> {
    let installation = state
        .control
        .make_installation_record(&token, iid)
        .await?;
    Ok(Json(installation.into()))
}

/// `GET /api/installations/{iid}/webhooks`
pub async fn list_webhooks_handler(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Path(iid): Path<i64>,
) -> AppResult<Json<RecordedWebhookListResponse>> {
    let webhooks = state.control.recorded_webhooks(&token, iid).await?;
    Ok(Json(RecordedWebhookListResponse {
        webhooks: webhooks.into_iter().map(Into::into).collect(),
    }))
}
