//! HTTP error mapping and body extractors.
//!
//! Every failure leaves the API as `{"message": "..."}` with a status
//! derived from the `ServiceError` variant. `ApiJson` / `ApiQuery` wrap
//! axum's extractors so malformed input gets the same envelope.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error};

use crate::types::{ServiceError, StoreError};

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Bet(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Store(StoreError::AccountNotFound(_))
            | ServiceError::Store(StoreError::TransactionNotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Store(StoreError::DuplicateUsername(_))
            | ServiceError::Store(StoreError::DuplicateId(_)) => StatusCode::CONFLICT,
            ServiceError::Store(StoreError::Backend(_)) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// JSON body extractor reporting decode failures as 400 `{"message"}`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ServiceError::Validation(rejection.body_text())),
        }
    }
}

/// Query-string extractor with the same error envelope.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ServiceError::Validation(rejection.body_text())),
        }
    }
}
