use axum::http::StatusCode;
use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::middleware::AuthenticatedUser;

pub async fn me(
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<MeResponseData>, ApiError> {
    Ok(ApiSuccess::new(StatusCode::OK, (&caller).into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeResponseData {
    pub user_id: String,
    pub email: String,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&AuthenticatedUser> for MeResponseData {
    fn from(caller: &AuthenticatedUser) -> Self {
        Self {
            user_id: caller.user_id.to_string(),
            email: caller.email.clone(),
            user_name: caller.user_name.clone(),
            expires_at: caller.expires_at,
        }
    }
}
