use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use minscan_core::types::TxHash;
use minscan_core::ViewSnapshot;

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct QueryRequest {
    query: String,
}

#[derive(Deserialize)]
pub(super) struct PageRequest {
    page: i64,
}

#[derive(Deserialize)]
pub(super) struct DetailRequest {
    hash: String,
}

fn body<T>(req: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    req.map(|Json(inner)| inner)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn get_state(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.controller.snapshot().await))
}

/// Enter-key path: the query is resolved as typed.
pub(super) async fn resolve(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let req = body(req)?;
    Ok(Json(state.controller.resolve(&req.query).await))
}

/// Search-button path: a blank query reloads the latest block.
pub(super) async fn search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let req = body(req)?;
    Ok(Json(state.controller.search(&req.query).await))
}

pub(super) async fn refresh(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.controller.load_latest().await))
}

pub(super) async fn set_page(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<PageRequest>, JsonRejection>,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let req = body(req)?;
    Ok(Json(state.controller.set_page(req.page).await))
}

pub(super) async fn next_page(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.controller.next_page().await))
}

pub(super) async fn prev_page(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.controller.prev_page().await))
}

pub(super) async fn select_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<DetailRequest>, JsonRejection>,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let req = body(req)?;
    let hash: TxHash = req
        .hash
        .trim()
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid transaction hash: {e}")))?;

    state
        .controller
        .select_detail(&hash)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("transaction {hash} is not in the current result")))
}

pub(super) async fn clear_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ViewSnapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(state.controller.clear_detail().await))
}
