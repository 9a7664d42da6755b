use std::fmt::Display;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use smo_autopublish::PublishError;
use smo_core::settings::SettingsError;

use crate::state::RequestId;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub request_id: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(Vec<String>),
    Unauthorized,
    NotFound(String),
    Internal,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl AppError {
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

impl RequestId {
    /// Log `err` and hide it behind a generic 500.
    pub fn internal(&self, err: impl Display) -> ApiError {
        tracing::error!(request_id = %self.0, error = %err, "request failed");
        AppError::Internal.with_request_id(&self.0)
    }

    pub fn publish_error(&self, err: PublishError) -> ApiError {
        match err {
            PublishError::Settings(SettingsError::Invalid(errors)) => {
                AppError::Validation(errors).with_request_id(&self.0)
            }
            PublishError::Settings(other) => {
                AppError::BadRequest(other.to_string()).with_request_id(&self.0)
            }
            other => self.internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message, details) = match self.error {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg, vec![]),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                "Settings rejected".to_string(),
                errors,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid API token".to_string(),
                vec![],
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, vec![]),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
                vec![],
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                    details,
                    request_id: self.request_id,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_with_request_id() {
        let err = AppError::Internal.with_request_id("req_123");
        assert_eq!(err.request_id, "req_123");
    }

    #[test]
    fn test_bad_request_response() {
        rt().block_on(async {
            let err = AppError::BadRequest("unknown status".to_string()).with_request_id("req_001");
            let (status, json) = body_json(err).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"]["code"], "invalid_request");
            assert_eq!(json["error"]["message"], "unknown status");
            assert_eq!(json["error"]["request_id"], "req_001");
            assert!(json["error"].get("details").is_none());
        });
    }

    #[test]
    fn test_validation_response_lists_every_error() {
        rt().block_on(async {
            let err = AppError::Validation(vec![
                "at least one platform must be selected".to_string(),
                "delay must be between 0 and 1440 minutes".to_string(),
            ])
            .with_request_id("req_002");
            let (status, json) = body_json(err).await;

            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(json["error"]["code"], "validation_failed");
            assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
        });
    }

    #[test]
    fn test_unauthorized_response() {
        rt().block_on(async {
            let (status, json) = body_json(AppError::Unauthorized.with_request_id("req_003")).await;

            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["error"]["code"], "unauthorized");
        });
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = AppError::NotFound("item 7".to_string()).with_request_id("req_004");
            let (status, json) = body_json(err).await;

            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(json["error"]["message"], "item 7");
        });
    }

    #[test]
    fn test_publish_error_mapping() {
        let request_id = RequestId("req_005".to_string());

        let invalid = request_id.publish_error(PublishError::Settings(SettingsError::Invalid(vec![
            "bad".to_string(),
        ])));
        assert!(matches!(invalid.error, AppError::Validation(ref e) if e.len() == 1));

        let shape = request_id.publish_error(PublishError::Settings(SettingsError::NotAnObject));
        assert!(matches!(shape.error, AppError::BadRequest(_)));

        let internal = request_id.publish_error(PublishError::NoPlatforms(3));
        assert!(matches!(internal.error, AppError::Internal));
        assert_eq!(internal.request_id, "req_005");
    }
}
