use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use roster_store::{StoreError, ValidationError};

/// Failure of an HTTP request, rendered as `{success: false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Detail is logged, never returned to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(m) | Self::Unauthorized(m) => m.clone(),
            Self::Internal(_) => "Server error".to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::BadRequest(e.0)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(m) => Self::BadRequest(m),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "message": self.public_message(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_bad_request_with_message() {
        let err: ApiError = StoreError::Conflict("Email already exists!".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Email already exists!");
    }

    #[test]
    fn validation_is_bad_request() {
        let err: ApiError = ValidationError("Mobile must be 10 digits".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Mobile must be 10 digits");
    }

    #[test]
    fn database_failure_hides_detail() {
        let err: ApiError = StoreError::Database("disk I/O error".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Server error");
    }

    #[test]
    fn unauthorized_status() {
        let err = ApiError::Unauthorized("Invalid email or password".into());
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
