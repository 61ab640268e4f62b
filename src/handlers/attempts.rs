// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::attempt::{SaveAnswerRequest, StartAttemptRequest},
    services::{
        attempts::{self, StartOutcome},
        scoring,
    },
    store::PgStore,
    utils::jwt::Claims,
};

/// Start a test attempt, or hand back the caller's open one for the same test.
///
/// 201 when a new attempt was created, 200 when an open attempt already existed.
pub async fn start_attempt(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let response = match attempts::start(&store, user_id, payload.test_id, Utc::now()).await? {
        StartOutcome::Created(attempt) => (StatusCode::CREATED, Json(attempt)),
        StartOutcome::Existing(attempt) => (StatusCode::OK, Json(attempt)),
    };
    Ok(response)
}

pub async fn get_attempt(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::get(&store, claims.user_id()?, attempt_id).await?;
    Ok(Json(attempt))
}

pub async fn pause_attempt(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::pause(&store, claims.user_id()?, attempt_id, Utc::now()).await?;
    Ok(Json(attempt))
}

pub async fn resume_attempt(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::resume(&store, claims.user_id()?, attempt_id, Utc::now()).await?;
    Ok(Json(attempt))
}

/// Save (or overwrite) the answer to one question.
pub async fn save_answer(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let answer = payload.into_new_answer()?;
    let saved =
        attempts::save_answer(&store, claims.user_id()?, attempt_id, question_id, answer).await?;
    Ok(Json(saved))
}

/// Finish the attempt and score it. A second call is a 409.
pub async fn complete_attempt(
    State(store): State<PgStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = scoring::complete_attempt(
        &store,
        claims.user_id()?,
        attempt_id,
        &config.scaled_score,
        Utc::now(),
    )
    .await?;
    Ok(Json(result))
}

pub async fn get_result(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = scoring::get_result(&store, claims.user_id()?, attempt_id).await?;
    Ok(Json(result))
}
