// Craft marketplace authentication service
// Library half: router, shared state and the auth core; `main.rs` wires real backends

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod validation;

use axum::{
    extract::{FromRef, OriginalUri, Request},
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{handlers, models, require_auth, AuthGate, AuthService, RequireRole};
use crate::config::RateLimitSettings;
use crate::error::ApiError;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_handler,
        handlers::register_craftsman_handler,
        handlers::login_handler,
        handlers::refresh_handler,
        handlers::logout_handler,
        handlers::me_handler,
        handlers::send_verification_handler,
        handlers::verify_email_handler,
        handlers::list_users_handler,
        handlers::get_user_handler,
        handlers::update_user_handler,
        handlers::delete_user_handler,
        handlers::health_handler,
    ),
    components(
        schemas(
            models::Role,
            models::RegisterRequest,
            models::RegisterCraftsmanRequest,
            models::LoginRequest,
            models::RefreshRequest,
            models::UpdateUserRequest,
            models::AuthResponse,
            models::CraftsmanAuthResponse,
            models::RefreshResponse,
            models::UserResponse,
            models::CraftsmanProfile,
            models::ContactInformation,
            models::MessageResponse,
            models::VerificationSentResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "users", description = "Account verification and administration"),
        (name = "health", description = "Liveness")
    ),
    info(
        title = "Craft Marketplace Auth API",
        version = "1.0.0",
        description = "Authentication core for the craft marketplace"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    pub fn new(auth: AuthService) -> Self {
        let gate = AuthGate::new(auth.tokens(), auth.revocations());
        Self {
            auth: Arc::new(auth),
            gate: Arc::new(gate),
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

/// Builds the application router.
///
/// `rate_limit` throttles the public credential routes per peer IP; serving
/// with it enabled requires `into_make_service_with_connect_info::<SocketAddr>`.
pub fn create_router(state: AppState, rate_limit: Option<RateLimitSettings>) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut credential_routes: Router<AppState> = Router::new()
        .route("/api/auth/register", post(handlers::register_handler))
        .route(
            "/api/auth/register/craftsman",
            post(handlers::register_craftsman_handler),
        )
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/refresh", post(handlers::refresh_handler));

    if let Some(settings) = rate_limit {
        match GovernorConfigBuilder::default()
            .per_second(settings.per_second)
            .burst_size(settings.burst_size)
            .finish()
        {
            Some(governor_conf) => {
                credential_routes = credential_routes.layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                });
            }
            None => tracing::warn!("Invalid rate limit settings, rate limiting disabled"),
        }
    }

    let admin = RequireRole::admin();
    let admin_routes: Router<AppState> = Router::new()
        .route("/api/users", get(handlers::list_users_handler))
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            admin.clone().middleware(req, next)
        }));

    let protected_routes: Router<AppState> = Router::new()
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/me", get(handlers::me_handler))
        .route(
            "/api/users/verify/send",
            post(handlers::send_verification_handler),
        )
        .route(
            "/api/users/:id",
            get(handlers::get_user_handler)
                .put(handlers::update_user_handler)
                .delete(handlers::delete_user_handler),
        )
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_auth,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health_handler))
        .route("/api/users/verify", get(handlers::verify_email_handler))
        .merge(credential_routes)
        .merge(protected_routes)
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound {
        resource: "route".to_string(),
        id: uri.path().to_string(),
    }
}
