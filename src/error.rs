use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::directory::DirectoryError;

/// Every failure the API can return to a client.
///
/// Credential failures stay deliberately vague: `InvalidCredentials` covers
/// both "no such user" and "wrong password" so responses cannot be used to
/// enumerate accounts.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Your account has been disabled. Contact an administrator.")]
    AccountDisabled,
    #[error("This email is already registered to another account")]
    DuplicateEmail,
    #[error("The password does not meet the security requirements")]
    WeakPassword(Vec<String>),
    #[error("User not found")]
    NotFound,
    #[error("Expected an Authorization header of the form 'Bearer <token>'")]
    MalformedAuthHeader,
    #[error("Invalid or malformed authentication token")]
    InvalidToken,
    #[error("Your session has expired, please log in again")]
    ExpiredToken,
    #[error("User not found or disabled")]
    Unauthorized,
    #[error("You do not have permission to perform this action")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials
            | ApiError::AccountDisabled
            | ApiError::MalformedAuthHeader
            | ApiError::InvalidToken
            | ApiError::ExpiredToken
            | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::WeakPassword(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials => "Invalid credentials",
            ApiError::AccountDisabled => "Account disabled",
            ApiError::DuplicateEmail => "Email already in use",
            ApiError::WeakPassword(_) => "Weak password",
            ApiError::NotFound => "Not found",
            ApiError::MalformedAuthHeader => "Invalid authorization header",
            ApiError::InvalidToken => "Invalid token",
            ApiError::ExpiredToken => "Expired token",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Forbidden => "Insufficient permissions",
            ApiError::Validation(_) => "Invalid data",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match &self {
            // Internals are logged, never returned to the client.
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                ("An unexpected error occurred".to_string(), None)
            }
            ApiError::WeakPassword(violations) => (self.to_string(), Some(violations.clone())),
            _ => (self.to_string(), None),
        };
        let body = ErrorBody {
            error: self.label(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DuplicateEmail => ApiError::DuplicateEmail,
            DirectoryError::NotFound => ApiError::NotFound,
            DirectoryError::Internal(e) => ApiError::Internal(e),
        }
    }
}
