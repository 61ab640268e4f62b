// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, digest, mistakes, review},
    state::AppState,
    utils::jwt::{auth_middleware, cron_middleware},
};

/// Assembles the main application router.
///
/// * Every route except the scheduler tick requires a user JWT.
/// * The tick is guarded by the optional cron secret instead.
/// * Trace and CORS layers wrap everything.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let attempt_routes = Router::new()
        .route("/", post(attempts::start_attempt))
        .route("/{id}", get(attempts::get_attempt))
        .route("/{id}/pause", post(attempts::pause_attempt))
        .route("/{id}/resume", post(attempts::resume_attempt))
        .route("/{id}/complete", post(attempts::complete_attempt))
        .route("/{id}/result", get(attempts::get_result))
        .route("/{id}/answers/{question_id}", put(attempts::save_answer))
        .layer(auth.clone());

    let mistake_routes = Router::new()
        .route("/", get(mistakes::list_mistakes))
        .layer(auth.clone());

    let review_routes = Router::new()
        .route("/items", get(review::get_plan).post(review::create_item))
        .route("/items/{id}/completions", put(review::set_completion))
        .layer(auth.clone());

    let digest_routes = Router::new()
        .route(
            "/settings",
            get(digest::get_settings).put(digest::update_settings),
        )
        .route("/send-now", post(digest::send_now))
        .layer(auth)
        // Called by the external cron, not by users.
        .merge(
            Router::new()
                .route("/tick", post(digest::run_tick))
                .layer(middleware::from_fn_with_state(state.clone(), cron_middleware)),
        );

    Router::new()
        .nest("/api/attempts", attempt_routes)
        .nest("/api/mistakes", mistake_routes)
        .nest("/api/review", review_routes)
        .nest("/api/digest", digest_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
