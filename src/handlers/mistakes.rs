// src/handlers/mistakes.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    services::mistakes::{self, MistakeFilter, MistakeParams},
    store::PgStore,
    utils::jwt::Claims,
};

/// Questions the caller most recently answered wrong, newest first.
///
/// Optional filters: `subject` (slug), `type`, `search` (case-insensitive).
pub async fn list_mistakes(
    State(store): State<PgStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<MistakeParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = MistakeFilter::try_from(params)?;
    let list = mistakes::find_mistakes(&store, claims.user_id()?, &filter).await?;
    Ok(Json(list))
}
