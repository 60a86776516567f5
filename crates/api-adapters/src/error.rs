//! HTTP mapping for registry errors.
//!
//! Admission failures are 400s with the message intact so the drawing client
//! can show it. Internal failures are logged here and leave as an opaque 500.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("request body too large")]
    PayloadTooLarge,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::Domain(DomainError::InvalidInput(rejection.body_text()))
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Domain(DomainError::InvalidInput(rejection.body_text()))
    }
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.kind(),
            Self::PayloadTooLarge => "payload_too_large",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            Self::Domain(DomainError::Internal(detail)) => {
                tracing::error!(error = %detail, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            Self::Domain(err @ DomainError::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Domain(err @ DomainError::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, err.to_string())
            }
            Self::Domain(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            err @ Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domains::FishId;

    #[test]
    fn domain_errors_keep_their_message() {
        let err = ApiError::from(DomainError::low_confidence(0.005));
        assert_eq!(err.to_string(), "fish probability too low: 0.50% (minimum: 1%)");
        assert_eq!(ApiError::PayloadTooLarge.to_string(), "request body too large");
    }

    #[test]
    fn status_codes_follow_the_error_kind() {
        let cases = [
            (ApiError::from(DomainError::NotFound(FishId::from("x"))), StatusCode::NOT_FOUND),
            (ApiError::from(DomainError::RateLimited), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::from(DomainError::InappropriateContent), StatusCode::BAD_REQUEST),
            (ApiError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_details_stay_private() {
        let response = ApiError::from(DomainError::Internal("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "internal server error");
        assert_eq!(body["kind"], "internal");
    }
}
