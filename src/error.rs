// HTTP API Error Types
use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::JwtError;
use crate::database::DatabaseError;
use crate::gateway::GatewayError;

const GENERIC_INTERNAL_MESSAGE: &str = "An error occurred while processing your request";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        details: Option<String>,
        field_errors: Option<BTreeMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // Analysis backend failure: upstream 4xx relayed, everything else 500
    UpstreamFailure {
        status: u16,
        message: String,
        detail: String,
    },

    // 500 Internal Server Error. `cause` is logged, never sent.
    InternalServerError {
        message: String,
        cause: String,
    },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UpstreamFailure { status, .. } => *status,
            ApiError::InternalServerError { .. } => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UpstreamFailure { message, .. } => message,
            ApiError::InternalServerError { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Short human title, sent as `error`
    pub fn title(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad request",
            ApiError::ValidationError { .. } => "Validation error",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound(_) => "Not found",
            ApiError::Conflict(_) => "Conflict",
            ApiError::UpstreamFailure { .. } => "Upstream failure",
            ApiError::InternalServerError { .. } => "Internal server error",
            ApiError::ServiceUnavailable(_) => "Service unavailable",
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UpstreamFailure { .. } => "UPSTREAM_FAILURE",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.title(),
            "message": self.message(),
            "code": self.error_code(),
        });

        match self {
            ApiError::ValidationError { details, field_errors, .. } => {
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                if let Some(field_errors) = field_errors {
                    body["fieldErrors"] = json!(field_errors);
                }
            }
            ApiError::UpstreamFailure { detail, .. } => {
                body["details"] = json!(detail);
            }
            _ => {}
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        details: impl Into<String>,
        field_errors: Option<BTreeMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: "Request validation failed".to_string(),
            details: Some(details.into()),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(cause: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            message: GENERIC_INTERNAL_MESSAGE.to_string(),
            cause: cause.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn upstream(status: u16, detail: impl Into<String>) -> Self {
        let status = if (400..500).contains(&status) { status } else { 500 };
        ApiError::UpstreamFailure {
            status,
            message: "The analysis service could not complete the request".to_string(),
            detail: detail.into(),
        }
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::Migration(e) => {
                ApiError::service_unavailable(format!("Database is being migrated: {e}"))
            }
            DatabaseError::Sqlx(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => ApiError::service_unavailable("Database temporarily unavailable"),
            other => ApiError::internal_server_error(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Upstream { status, detail } => ApiError::upstream(status, detail),
            other => ApiError::upstream(500, other.to_string()),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let message = errs
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("invalid value ({})", e.code),
                })
                .collect::<Vec<_>>()
                .join("; ");
            field_errors.insert(field.to_string(), message);
        }
        let details = field_errors
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect::<Vec<_>>()
            .join(", ");
        ApiError::validation_error(details, Some(field_errors))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            ApiError::InternalServerError { cause, .. } => {
                tracing::error!(status = status.as_u16(), %cause, "Request failed");
            }
            ApiError::UpstreamFailure { detail, .. } if status.is_server_error() => {
                tracing::error!(status = status.as_u16(), %detail, "Analysis backend failure");
            }
            _ if status.is_server_error() => {
                tracing::error!(status = status.as_u16(), message = self.message(), "Request failed");
            }
            _ => {
                tracing::warn!(status = status.as_u16(), code = self.error_code(), message = self.message(), "Request rejected");
            }
        }

        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_client_errors_are_relayed() {
        let err: ApiError = GatewayError::Upstream {
            status: 422,
            detail: "field required".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_json()["details"], "field required");
    }

    #[test]
    fn upstream_server_errors_become_500() {
        let err: ApiError = GatewayError::Upstream {
            status: 503,
            detail: "Tax agent not initialized".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
        let err: ApiError = GatewayError::Unreachable("connection refused".to_string()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_json()["error"], "Upstream failure");
    }

    #[test]
    fn internal_errors_are_redacted() {
        let err: ApiError = DatabaseError::Decode("bad status 'archived'".to_string()).into();
        let body = err.to_json();
        assert_eq!(err.status_code(), 500);
        assert_eq!(body["message"], GENERIC_INTERNAL_MESSAGE);
        assert!(body.get("details").is_none());
        assert!(!body.to_string().contains("archived"));
    }

    #[test]
    fn database_conflict_maps_to_409() {
        let err: ApiError = DatabaseError::Conflict("exists".to_string()).into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_json()["success"], false);
    }
}
