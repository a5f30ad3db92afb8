use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::ServiceError;

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub error_code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: code.to_string(),
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            // Forbidden is indistinguishable from NotFound to the caller
            ServiceError::NotFound { entity, .. } | ServiceError::Forbidden { entity, .. } => {
                warn!(kind = err.kind(), error = %err, "request rejected");
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{} not found", entity))
            }
            ServiceError::Validation(message) => {
                warn!(kind = err.kind(), error = %err, "request rejected");
                ApiError::bad_request(message.clone())
            }
            ServiceError::InvalidState { .. } => {
                warn!(kind = err.kind(), error = %err, "request rejected");
                ApiError::new(StatusCode::CONFLICT, "INVALID_STATE", err.to_string())
            }
            ServiceError::Persistence(_) | ServiceError::DataIntegrity(_) => {
                error!(kind = err.kind(), error = %err, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal server error")
            }
            ServiceError::Generator(_) => {
                error!(kind = err.kind(), error = %err, "request failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "GENERATOR_ERROR", "plan generator unavailable")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn forbidden_and_not_found_render_identically() {
        let id = Uuid::new_v4();
        let hidden = ApiError::from(ServiceError::forbidden("training_session", id));
        let missing = ApiError::from(ServiceError::not_found("training_session", id));

        assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
        assert_eq!(hidden.status(), missing.status());
        assert_eq!(hidden.error_code, missing.error_code);
        assert_eq!(hidden.message, missing.message);
        assert_eq!(hidden.message, "training_session not found");
    }

    #[test]
    fn store_details_stay_out_of_the_body() {
        let err = ServiceError::DataIntegrity("exercise 42 has no exercise type".into());
        let api = ApiError::from(err);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("exercise 42"));
    }

    #[test]
    fn generator_failures_are_bad_gateway() {
        let api = ApiError::from(ServiceError::Generator("timeout".into()));
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);
    }
}
