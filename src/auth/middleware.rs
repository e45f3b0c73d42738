// Authentication middleware for protected routes

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{
    error::AuthError, models::Role, revocation::RevocationList, token::TokenService,
};

/// Identity established by the gate for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    /// `jti` of the presented access token
    pub token_id: String,
    /// `exp` of the presented access token
    pub expires_at: i64,
}

/// Validates bearer access tokens for protected routes
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
    revocations: RevocationList,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>, revocations: RevocationList) -> Self {
        Self {
            tokens,
            revocations,
        }
    }

    /// Resolves the `Authorization: Bearer <token>` header to an identity.
    ///
    /// Only access tokens are accepted, and revoked token ids are refused.
    /// A revocation store outage fails closed.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.tokens.validate_access_token(token)?;

        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(AuthError::RevokedToken);
        }

        Ok(AuthenticatedUser {
            user_id: claims.user_id()?,
            role: claims.role,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)
}

/// Middleware that authenticates the request and stores the identity in its
/// extensions for [`AuthenticatedUser`] to pick up
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let endpoint = request.uri().path().to_string();

    let user = gate
        .authenticate(request.headers())
        .await
        .map_err(|err| {
            warn!("Authentication failed for endpoint {}: {}", endpoint, err);
            err
        })?;

    debug!(
        "Authenticated user_id={}, role={}, endpoint={}",
        user.user_id, user.role, endpoint
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Reads the identity placed by [`require_auth`]; routes without the
/// middleware reject with `MissingToken`
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Authorization middleware admitting only the listed roles
///
/// Must be layered inside [`require_auth`].
#[derive(Debug, Clone)]
pub struct RequireRole {
    allowed: Vec<Role>,
}

impl RequireRole {
    /// Create a new RequireRole middleware admitting `allowed`
    pub fn new(allowed: impl Into<Vec<Role>>) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    /// Create a middleware that requires Admin role
    pub fn admin() -> Self {
        Self::new([Role::Admin])
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    /// Middleware function that validates role-based access
    pub async fn middleware(self, request: Request, next: Next) -> Result<Response, AuthError> {
        let endpoint = request.uri().path().to_string();

        let user = request
            .extensions()
            .get::<AuthenticatedUser>()
            .ok_or_else(|| {
                warn!("Role check without authenticated user for endpoint: {}", endpoint);
                AuthError::MissingToken
            })?;

        if !self.allows(user.role) {
            warn!(
                "Authorization failed: user_id={}, allowed_roles={:?}, actual_role={}, endpoint={}",
                user.user_id, self.allowed, user.role, endpoint
            );
            return Err(AuthError::InsufficientPermissions { actual: user.role });
        }

        debug!(
            "Authorization successful: user_id={}, role={}, endpoint={}",
            user.user_id, user.role, endpoint
        );
        Ok(next.run(request).await)
    }
}
