use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::auth::{ADMIN_CAPABILITY, jwt};
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub capabilities: Vec<String>,
}

impl AuthUser {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.has_capability(ADMIN_CAPABILITY) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Honeypot administration access required".to_string(),
            ))
        }
    }

    /// Identity used for failure tracking and the blocked log.
    pub fn identity(&self) -> String {
        format!("user:{}", self.user_id)
    }
}

/// Token from the Authorization header, falling back to the access_token cookie.
fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(auth_header) = parts.headers.get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(Some(token.to_string()));
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get("access_token").map(|c| c.value().to_string()))
}

fn authenticate(parts: &Parts, state: &SharedState) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };

    let claims = jwt::decode_token(&token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(Some(AuthUser {
        user_id: claims.sub,
        capabilities: claims.caps,
    }))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?.ok_or_else(|| {
            AppError::Unauthorized("Missing authentication token".to_string())
        })
    }
}

/// The acting principal, if any. Anonymous requests extract as `None`; a
/// present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.0.as_ref().is_some_and(|u| u.has_capability(capability))
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

impl FromRequestParts<SharedState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(authenticate(parts, state)?))
    }
}
