// src/handlers/review.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::review::{CreateReviewItemRequest, PlanQuery, SetCompletionRequest, parse_date},
    services::review::ReviewScheduler,
    store::PgStore,
    utils::jwt::Claims,
};

/// The caller's review plan with checkpoint statuses relative to `today`
/// (defaults to the current UTC date).
pub async fn get_plan(
    State(store): State<PgStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PlanQuery>,
) -> Result<impl IntoResponse, AppError> {
    let today = match query.today.as_deref() {
        Some(raw) => parse_date("today", raw)?,
        None => Utc::now().date_naive(),
    };

    let plan = ReviewScheduler::new(&store, &config.review_intervals)
        .plan(claims.user_id()?, today)
        .await?;
    Ok(Json(plan))
}

/// Mark a topic as studied. Re-marking the same topic on the same date returns the existing item.
pub async fn create_item(
    State(store): State<PgStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateReviewItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.subject.trim().is_empty() || payload.topic.trim().is_empty() {
        return Err(AppError::BadRequest(
            "subject and topic must not be blank".to_string(),
        ));
    }
    let studied_date = match payload.studied_date.as_deref() {
        Some(raw) => parse_date("studiedDate", raw)?,
        None => Utc::now().date_naive(),
    };

    let item = ReviewScheduler::new(&store, &config.review_intervals)
        .mark_studied(claims.user_id()?, &payload.subject, &payload.topic, studied_date)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Mark or unmark one review checkpoint. Idempotent in both directions.
pub async fn set_completion(
    State(store): State<PgStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(item_id): Path<i64>,
    Json(payload): Json<SetCompletionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let review_date = parse_date("reviewDate", &payload.review_date)?;

    let outcome = ReviewScheduler::new(&store, &config.review_intervals)
        .set_completion(
            claims.user_id()?,
            item_id,
            review_date,
            payload.interval_days,
            payload.done,
        )
        .await?;
    Ok(Json(outcome))
}
