//! Request guards: bearer-token players and the admin token header.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use super::routes::AppState;
use crate::types::ServiceError;

/// Header carrying the admin shared secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// An authenticated player.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ServiceError::Unauthorized("Authorization header required".into()))?;
        let value = header
            .to_str()
            .map_err(|_| ServiceError::Unauthorized("Invalid or expired token".into()))?;
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if token.is_empty() {
            return Err(ServiceError::Unauthorized("Token required".into()));
        }

        let account_id = state.accounts.authenticate(token).await?;
        Ok(AuthUser { account_id })
    }
}

/// Caller presented the configured admin token.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub name: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_ref() else {
            return Err(ServiceError::Forbidden("Admin access is not configured".into()));
        };
        let presented = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented.is_empty() || presented != expected.expose_secret().as_str() {
            return Err(ServiceError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser {
            name: "admin".into(),
        })
    }
}
