// src/handlers/digest.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::DIGEST_LOG_LIMIT,
    error::AppError,
    models::digest::{DailyReportSetting, DigestSettingsResponse, DigestSettingsUpdate},
    services::digest::scheduler::DigestScheduler,
    state::AppState,
    store::{DigestStore, PgStore},
    utils::jwt::Claims,
};

async fn settings_response(store: &PgStore, user_id: i64) -> Result<DigestSettingsResponse, AppError> {
    let setting = store
        .find_setting(user_id)
        .await?
        .unwrap_or_else(|| DailyReportSetting::defaults_for(user_id));
    let logs = store.recent_logs(user_id, DIGEST_LOG_LIMIT).await?;
    Ok(DigestSettingsResponse { setting, logs })
}

/// Current digest settings (defaults if never saved) plus the latest dispatch log rows.
pub async fn get_settings(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(settings_response(&store, claims.user_id()?).await?))
}

pub async fn update_settings(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<DigestSettingsUpdate>,
) -> Result<impl IntoResponse, AppError> {
    payload.target_email = payload.target_email.trim().to_string();
    payload.time_zone = payload.time_zone.trim().to_string();
    payload.validate()?;
    if payload.enabled && payload.target_email.is_empty() {
        return Err(AppError::BadRequest(
            "targetEmail is required when the digest is enabled".to_string(),
        ));
    }

    let user_id = claims.user_id()?;
    store.upsert_setting(user_id, &payload).await?;
    tracing::info!(user_id, enabled = payload.enabled, "Digest settings updated");

    Ok(Json(settings_response(&store, user_id).await?))
}

/// Send today's digest right away, regardless of hour or previous sends.
pub async fn send_now(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let scheduler = DigestScheduler::new(&state.store, &state.dispatcher, state.dispatch_timeout());
    let response = scheduler.send_now(claims.user_id()?, Utc::now()).await?;
    Ok(Json(response))
}

/// One scheduler pass, called hourly by an external cron.
pub async fn run_tick(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let scheduler = DigestScheduler::new(&state.store, &state.dispatcher, state.dispatch_timeout());
    let summary = scheduler.run_tick(Utc::now()).await?;
    Ok(Json(summary))
}
