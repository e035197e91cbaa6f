/// Unified error types for the iBlog API
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Input shape violations, every violated field listed
    #[error("{}", join_messages(.0))]
    Validation(Vec<FieldError>),

    /// Business-rule violation
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected credential
    #[error("{0}")]
    Unauthorized(String),

    /// Role mismatch
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity absent
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Malformed token or bad signature
    #[error("Invalid token")]
    TokenInvalid,

    /// Valid signature, past expiry
    #[error("Token has been expired")]
    TokenExpired,

    /// No account holds this reset token, or it expired
    #[error("Reset password token is invalid or has been expired")]
    ResetTokenInvalidOrExpired,

    /// Reset email could not be delivered
    #[error("Email could not be sent. Please check your credentials")]
    EmailNotSent,

    /// Unexpected or downstream failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ApiError {
    /// HTTP status for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::BadRequest(_)
            | ApiError::ResetTokenInvalidOrExpired => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::TokenInvalid | ApiError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EmailNotSent
            | ApiError::Internal(_)
            | ApiError::Database(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message; internal details are never exposed
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Io(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Field-level errors carried in the envelope
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            ApiError::Validation(errors) => errors.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                // SQLite reports "UNIQUE constraint failed: <table>.<column>"
                let field = db_err
                    .message()
                    .rsplit('.')
                    .next()
                    .unwrap_or("value")
                    .trim()
                    .to_string();
                return ApiError::Conflict(format!("This {} has already been taken", field));
            }
        }
        ApiError::Database(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut list: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, violations)| {
                let field = field.to_string();
                violations.iter().map(move |v| {
                    let message = v
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        list.sort_by(|a, b| a.path.cmp(&b.path));
        ApiError::Validation(list)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Error response envelope
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<FieldError>,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorEnvelope {
            status_code: status.as_u16(),
            message: self.client_message(),
            success: false,
            errors: self.field_errors(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Please provide a name"))]
        name: String,
        #[validate(email(message = "Please provide a valid email"))]
        email: String,
    }

    #[test]
    fn test_validation_lists_every_field() {
        let sample = Sample {
            name: String::new(),
            email: "nope".to_string(),
        };
        let err: ApiError = sample.validate().unwrap_err().into();

        let fields = err.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].path, "email");
        assert_eq!(fields[1].path, "name");
        assert_eq!(
            err.client_message(),
            "Please provide a valid email, Please provide a name"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::Internal("smtp password rejected".to_string());
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::EmailNotSent;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.client_message().starts_with("Email could not be sent"));
    }

    #[test]
    fn test_token_errors_are_distinct() {
        assert_eq!(ApiError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenInvalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_ne!(
            ApiError::TokenExpired.client_message(),
            ApiError::TokenInvalid.client_message()
        );
        assert_eq!(
            ApiError::ResetTokenInvalidOrExpired.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
