// HTTP handlers for authentication and account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{
        AuthResponse, CraftsmanAuthResponse, LoginRequest, MessageResponse, RefreshRequest,
        RefreshResponse, RegisterCraftsmanRequest, RegisterRequest, UpdateUserRequest,
        UserResponse, VerificationSentResponse, VerifyEmailQuery,
    },
    service::AuthService,
};
use crate::error::ApiError;

/// Register a new customer
/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or weak password", body = String, example = json!({"error": "password must contain at least one number", "code": "password_policy"})),
        (status = 409, description = "Email already registered", body = String, example = json!({"error": "Email already exists", "code": "email_exists"}))
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    request.validate()?;
    let response = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register a craftsman account and profile in one step
/// POST /api/auth/register/craftsman
#[utoipa::path(
    post,
    path = "/api/auth/register/craftsman",
    request_body = RegisterCraftsmanRequest,
    responses(
        (status = 201, description = "Account and profile created", body = CraftsmanAuthResponse),
        (status = 400, description = "Invalid input or weak password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Profile could not be stored; nothing was created")
    ),
    tag = "auth"
)]
pub async fn register_craftsman_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<RegisterCraftsmanRequest>,
) -> Result<(StatusCode, Json<CraftsmanAuthResponse>), ApiError> {
    request.validate()?;
    let response = service.register_craftsman(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login a user
/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = String, example = json!({"error": "Invalid email or password", "code": "invalid_credentials"}))
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;
    let response = service.login(request).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new access token
/// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Refresh token expired (code token_expired) or invalid (code token_invalid)")
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let response = service.refresh(&request.refresh_token).await?;
    Ok(Json(response))
}

/// Revoke the presented access token
/// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing, invalid, expired or already revoked token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, AuthError> {
    service.logout(&user.token_id, user.expires_at).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Get current user information (protected endpoint)
/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthError> {
    let response = service.me(user.user_id).await?;
    Ok(Json(response))
}

/// Issue an email verification token for the caller
/// POST /api/users/verify/send
#[utoipa::path(
    post,
    path = "/api/users/verify/send",
    responses(
        (status = 200, description = "Verification token issued", body = VerificationSentResponse),
        (status = 400, description = "Email already verified"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn send_verification_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
) -> Result<Json<VerificationSentResponse>, AuthError> {
    let response = service.send_verification(user.user_id).await?;
    Ok(Json(response))
}

/// Redeem an email verification token
/// GET /api/users/verify?token=
#[utoipa::path(
    get,
    path = "/api/users/verify",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Unknown, used or expired token", body = String, example = json!({"error": "Invalid or expired verification token", "code": "verification_token_invalid"}))
    ),
    tag = "users"
)]
pub async fn verify_email_handler(
    State(service): State<Arc<AuthService>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    // a missing token is just another token that was never issued
    let token = query.token.unwrap_or_default();
    service.verify_email(&token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// List all accounts (admin only)
/// GET /api/users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts", body = Vec<UserResponse>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users_handler(
    State(service): State<Arc<AuthService>>,
) -> Result<Json<Vec<UserResponse>>, AuthError> {
    let users = service.list_users().await?;
    Ok(Json(users))
}

/// Get one account (owner or admin)
/// GET /api/users/:id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is neither the owner nor an admin"),
        (status = 404, description = "No such account")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    let response = service.get_user(&user, id).await?;
    Ok(Json(response))
}

/// Update name, surname, username or password of an account (owner or admin)
/// PUT /api/users/:id
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid input or weak password"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is neither the owner nor an admin"),
        (status = 404, description = "No such account")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    request.validate()?;
    let response = service.update_user(&user, id, request).await?;
    Ok(Json(response))
}

/// Delete an account (owner or admin)
/// DELETE /api/users/:id
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is neither the owner nor an admin"),
        (status = 404, description = "No such account")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(service): State<Arc<AuthService>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AuthError> {
    service.delete_user(&user, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// Liveness probe
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = String, example = json!({"status": "ok"}))
    ),
    tag = "health"
)]
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
