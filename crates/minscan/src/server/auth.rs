use axum::http::HeaderMap;

use super::error::AppError;

pub(super) const API_TOKEN_HEADER: &str = "x-api-token";

/// Reject the request unless it carries this session's token.
pub(super) fn check_auth(expected_token: &str, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized(
            "invalid or missing X-API-Token".to_string(),
        ));
    }
    Ok(())
}
