mod auth;
mod error;
mod view;

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::{Json, Router};
use eyre::WrapErr;
use tower_http::cors::{AllowOrigin, CorsLayer};

use minscan_core::ViewController;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub controller: Arc<ViewController>,
    pub api_token: String,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches. Otherwise, omit the header entirely so browsers
    // get a clean CORS rejection instead of a mismatched origin value.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .wrap_err_with(|| format!("invalid origin `{origin}`"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new().route("/api/v1/health", get(health));

    let protected_api = Router::new()
        .route("/api/v1/state", get(view::get_state))
        .route("/api/v1/resolve", post(view::resolve))
        .route("/api/v1/search", post(view::search))
        .route("/api/v1/refresh", post(view::refresh))
        .route("/api/v1/page", post(view::set_page))
        .route("/api/v1/page/next", post(view::next_page))
        .route("/api/v1/page/prev", post(view::prev_page))
        .route(
            "/api/v1/detail",
            post(view::select_detail).delete(view::clear_detail),
        );

    Ok(Router::new()
        .merge(public_api)
        .merge(protected_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}
