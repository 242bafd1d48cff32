use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::inbound::http::middleware::bearer_token;
use crate::inbound::http::router::AppState;

/// Revoke a refresh token taken from the body, or from the bearer header
/// when no body is sent.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    let secret = match body {
        Some(Json(LogoutRequest { refresh_token })) => refresh_token,
        None => bearer_token(&headers)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("Missing refresh token".to_string()))?,
    };

    state
        .auth_service
        .logout(&secret)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Logged out")))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogoutRequest {
    refresh_token: String,
}
