//! Caller identity
//!
//! Authentication happens upstream; this service only reads the user id the
//! gateway forwards in `X-User-Id`.

use crate::{ApiError, ApiResult};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const USER_ID_HEADER: &str = "x-user-id";

/// User id from the request, absent for anonymous callers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentUser(pub Option<String>);

impl CurrentUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// User id, or 400 for anonymous callers
    pub fn require(&self) -> ApiResult<&str> {
        self.id()
            .ok_or_else(|| ApiError::BadRequest("X-User-Id header is required".to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(CurrentUser(None));
        };

        let user_id = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("X-User-Id must be visible ASCII".to_string()))?
            .trim();

        if user_id.is_empty() {
            Ok(CurrentUser(None))
        } else {
            Ok(CurrentUser(Some(user_id.to_string())))
        }
    }
}
