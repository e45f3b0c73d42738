// JWT token generation and validation service

use crate::auth::{
    error::AuthError,
    models::{Role, TokenPair},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access tokens expire in 15 minutes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Refresh tokens expire in 7 days
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// JWT claims structure
///
/// Refresh tokens carry only `sub`, `role` and the registered claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token id, the revocation key
    pub jti: String,
}

impl Claims {
    /// Parses the subject back into a user id
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    /// Seconds left before expiry, zero once expired
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Optional profile fields embedded in access tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayAttributes {
    pub name: Option<String>,
    pub surname: Option<String>,
}

impl DisplayAttributes {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            surname: Some(surname.into()),
        }
    }
}

/// Which signing secret a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token service for JWT operations
///
/// Access and refresh tokens are signed with different secrets, so a token of one
/// kind never validates as the other.
#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_token_duration: i64,  // in seconds
    refresh_token_duration: i64, // in seconds
}

impl TokenService {
    /// Create a new TokenService with one secret per token kind
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_duration: ACCESS_TOKEN_TTL_SECS,
            refresh_token_duration: REFRESH_TOKEN_TTL_SECS,
        }
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn access_claims(&self, user_id: Uuid, role: Role, attrs: &DisplayAttributes, now: i64) -> Claims {
        Claims {
            sub: user_id.to_string(),
            role,
            name: attrs.name.clone(),
            surname: attrs.surname.clone(),
            iat: now,
            nbf: now,
            exp: now + self.access_token_duration,
            jti: Uuid::new_v4().to_string(),
        }
    }

    fn refresh_claims(&self, user_id: Uuid, role: Role, now: i64) -> Claims {
        Claims {
            sub: user_id.to_string(),
            role,
            name: None,
            surname: None,
            iat: now,
            nbf: now,
            exp: now + self.refresh_token_duration,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Generate an access token (15 minutes)
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        role: Role,
        attrs: &DisplayAttributes,
    ) -> Result<String, AuthError> {
        let claims = self.access_claims(user_id, role, attrs, Utc::now().timestamp());
        encode_claims(&claims, &self.access_secret)
    }

    /// Generate a refresh token (7 days)
    pub fn generate_refresh_token(&self, user_id: Uuid, role: Role) -> Result<String, AuthError> {
        let claims = self.refresh_claims(user_id, role, Utc::now().timestamp());
        encode_claims(&claims, &self.refresh_secret)
    }

    /// Generate both tokens from a single clock reading.
    /// Either both are returned or neither is.
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        role: Role,
        attrs: &DisplayAttributes,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();
        let access_token = encode_claims(
            &self.access_claims(user_id, role, attrs, now),
            &self.access_secret,
        )?;
        let refresh_token = encode_claims(
            &self.refresh_claims(user_id, role, now),
            &self.refresh_secret,
        )?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Validate a token against the secret for `kind`
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        decode_claims(token, self.secret(kind).as_bytes())
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate(token, TokenKind::Access)
    }

    /// Validate a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate(token, TokenKind::Refresh)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Only subject and role carry over; display attributes need a full login.
    /// Refresh validation errors are returned unchanged.
    pub fn refresh_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validate_refresh_token(refresh_token)?;
        let user_id = claims.user_id()?;
        self.generate_access_token(user_id, claims.role, &DisplayAttributes::default())
    }
}

/// Sign `claims` with HS256
pub fn encode_claims(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
}

/// Decode and validate a token signed with `secret`.
///
/// Only HS256 is accepted. Expiry is reported as `ExpiredToken`; every other
/// failure (bad signature, wrong algorithm, malformed input, missing claims)
/// is `InvalidToken`. No leeway: a token is rejected the second after `exp`.
pub fn decode_claims(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
}

#[cfg(test)]
pub(crate) const TEST_ACCESS_SECRET: &str = "test_access_secret_for_testing_purposes";
#[cfg(test)]
pub(crate) const TEST_REFRESH_SECRET: &str = "test_refresh_secret_for_testing_purposes";

#[cfg(test)]
pub(crate) fn test_token_service() -> TokenService {
    TokenService::new(TEST_ACCESS_SECRET, TEST_REFRESH_SECRET)
}

/// Signs an access token whose `exp` is `exp_offset` seconds from now
#[cfg(test)]
pub(crate) fn forge_access_token(user_id: Uuid, role: Role, exp_offset: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        name: None,
        surname: None,
        iat: now - 1000,
        nbf: now - 1000,
        exp: now + exp_offset,
        jti: Uuid::new_v4().to_string(),
    };
    encode_claims(&claims, TEST_ACCESS_SECRET).unwrap()
}
