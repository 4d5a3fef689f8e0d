use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::tokens;

const BAD_TOKEN: &str = "Invalid or expired token";

/// The authenticated caller, loaded fresh from the store. The password hash
/// stays behind in the row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl CurrentUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Extractor that requires a bearer token.
/// Missing token is 401; a present-but-invalid token, or a token whose user no
/// longer resolves, is 403.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = tokens::decode_session_token(&state.jwt_secret, token)
            .map_err(|_| ApiError::Forbidden(BAD_TOKEN))?;

        let user = state
            .db
            .find_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::Forbidden(BAD_TOKEN))?;

        let id = user.id.parse().map_err(|_| ApiError::Forbidden(BAD_TOKEN))?;

        Ok(CurrentUser {
            id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        })
    }
}
