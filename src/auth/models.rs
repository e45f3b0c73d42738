// Authentication data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::error::AuthError;
use crate::validation::{validate_not_blank, validate_username};

/// Closed set of account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Craftsman,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Craftsman => "craftsman",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "craftsman" => Ok(Role::Craftsman),
            "customer" => Ok(Role::Customer),
            other => Err(AuthError::InvalidRole(other.to_string())),
        }
    }
}

/// Credential-bearing user record as held by the user store.
///
/// Deliberately not `Serialize`: HTTP responses use [`UserResponse`].
#[derive(Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

/// Fields required to create a user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Public projection of a user (excludes password_hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "Ana")]
    pub name: String,
    #[schema(example = "Novak")]
    pub surname: String,
    #[schema(example = "ana.novak")]
    pub username: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            surname: user.surname.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            verified_at: user.verified_at,
            created_at: user.created_at,
        }
    }
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        UserResponse::from(&user)
    }
}

/// Craftsman contact details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContactInformation {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub social_media: HashMap<String, String>,
}

/// Fields required to create a craftsman profile
#[derive(Debug, Clone)]
pub struct NewCraftsmanProfile {
    pub user_id: Uuid,
    pub bio: String,
    pub experience: i32,
    pub rating: f64,
    pub location: String,
    pub contact_info: ContactInformation,
}

/// Craftsman profile attached to a craftsman account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CraftsmanProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    /// Years of experience
    pub experience: i32,
    #[schema(minimum = 0.0, maximum = 5.0)]
    pub rating: f64,
    pub location: String,
    pub contact_info: ContactInformation,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Customer registration request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    #[schema(example = "Ana")]
    pub name: String,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    #[schema(example = "Novak")]
    pub surname: String,
    #[validate(length(min = 3, max = 50), custom = "validate_username")]
    #[schema(example = "ana.novak")]
    pub username: String,
    #[validate(email)]
    #[schema(example = "ana@example.com")]
    pub email: String,
    /// Strength is checked by the password policy, not here
    #[schema(example = "Str0ng!Pass")]
    pub password: String,
}

/// Combined craftsman account + profile registration request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterCraftsmanRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub surname: String,
    #[validate(length(min = 3, max = 50), custom = "validate_username")]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub bio: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    pub experience: i32,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: f64,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    #[schema(example = "Ljubljana")]
    pub location: String,
    #[serde(default)]
    pub contact_info: ContactInformation,
}

impl RegisterCraftsmanRequest {
    /// Splits off the account half of the registration
    pub fn account(&self) -> RegisterRequest {
        RegisterRequest {
            name: self.name.clone(),
            surname: self.surname.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// Login request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Account update request DTO; omitted fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub surname: Option<String>,
    #[validate(length(min = 3, max = 50), custom = "validate_username")]
    pub username: Option<String>,
    /// Checked against the password policy before it is stored
    pub password: Option<String>,
}

/// Token refresh request DTO
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Query string of the email verification link
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    /// Token delivered to the user's inbox
    pub token: Option<String>,
}

/// Access + refresh token pair, minted together or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

impl AuthResponse {
    pub fn new(tokens: TokenPair, user: UserResponse) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user,
        }
    }
}

/// Craftsman registration response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CraftsmanAuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
    pub craftsman: CraftsmanProfile,
}

/// Refresh response DTO; only the access token is renewed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response to a verification request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationSentResponse {
    pub message: String,
    /// Present only when the server is configured to expose it (development)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}
