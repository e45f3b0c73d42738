// Authentication and authorization error types

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::models::Role;
use crate::auth::password::PolicyViolation;
use crate::store::StoreError;

/// Authentication and authorization error types
#[derive(Debug, Error)]
pub enum AuthError {
    // Client errors
    #[error("Invalid password: {0}")]
    PasswordPolicy(#[from] PolicyViolation),

    /// Unknown email and wrong password are deliberately the same error
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Email already verified")]
    EmailAlreadyVerified,

    /// Never issued, already redeemed and expired look the same
    #[error("Invalid or expired verification token")]
    VerificationTokenNotFound,

    #[error("User not found")]
    UserNotFound,

    // Authorization errors
    /// Authenticated user's role is not among the route's allowed roles
    #[error("Insufficient permissions: role '{actual}' is not allowed")]
    InsufficientPermissions { actual: Role },

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    // Server errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error: {0}")]
    PasswordHashError(String),

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::PasswordPolicy(_)
            | AuthError::EmailAlreadyExists
            | AuthError::EmailAlreadyVerified
            | AuthError::UserNotFound => debug!("Auth request rejected: {}", self),
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::RevokedToken
            | AuthError::VerificationTokenNotFound
            | AuthError::InsufficientPermissions { .. }
            | AuthError::InvalidRole(_) => warn!("Auth request rejected: {}", self),
            AuthError::Store(_)
            | AuthError::PasswordHashError(_)
            | AuthError::TokenGenerationError(_)
            | AuthError::ConfigError(_) => error!("Auth failure: {}", self),
        }

        let body = Json(json!({
            "error": self.error_message(),
            "code": self.code(),
        }));

        let mut response = (self.status_code(), body).into_response();
        if self.is_token_failure() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::PasswordPolicy(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthError::RevokedToken => StatusCode::UNAUTHORIZED,
            AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
            AuthError::EmailAlreadyVerified => StatusCode::BAD_REQUEST,
            AuthError::VerificationTokenNotFound => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            AuthError::InvalidRole(_) => StatusCode::BAD_REQUEST,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHashError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenGenerationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::PasswordPolicy(_) => "password_policy",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MissingToken => "token_missing",
            AuthError::InvalidToken => "token_invalid",
            AuthError::ExpiredToken => "token_expired",
            AuthError::RevokedToken => "token_revoked",
            AuthError::EmailAlreadyExists => "email_exists",
            AuthError::EmailAlreadyVerified => "email_already_verified",
            AuthError::VerificationTokenNotFound => "verification_token_invalid",
            AuthError::UserNotFound => "user_not_found",
            AuthError::InsufficientPermissions { .. } => "insufficient_permissions",
            AuthError::InvalidRole(_) => "invalid_role",
            AuthError::Store(_)
            | AuthError::PasswordHashError(_)
            | AuthError::TokenGenerationError(_)
            | AuthError::ConfigError(_) => "internal_error",
        }
    }

    /// Get a descriptive error message for this error
    /// This message is safe to send to clients (no sensitive data)
    pub fn error_message(&self) -> String {
        match self {
            AuthError::PasswordPolicy(violation) => violation.to_string(),
            AuthError::InsufficientPermissions { .. } => "Insufficient permissions".to_string(),
            AuthError::Store(_)
            | AuthError::PasswordHashError(_)
            | AuthError::TokenGenerationError(_)
            | AuthError::ConfigError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for failures the caller can fix by re-authenticating or refreshing;
    /// these responses carry a `WWW-Authenticate: Bearer` challenge
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::InvalidToken
                | AuthError::ExpiredToken
                | AuthError::RevokedToken
        )
    }
}
