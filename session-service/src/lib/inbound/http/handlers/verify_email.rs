use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::inbound::http::router::AppState;
use crate::session::errors::AuthError;

const INVALID_VERIFICATION_MESSAGE: &str = "Invalid or expired verification token";

pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    state
        .auth_service
        .verify_email(&body.token)
        .await
        .map_err(|e| match e {
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::TokenRevoked => {
                tracing::debug!(reason = %e, "Verification token rejected");
                ApiError::BadRequest(INVALID_VERIFICATION_MESSAGE.to_string())
            }
            e => ApiError::from(e),
        })
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyEmailRequest {
    token: String,
}
