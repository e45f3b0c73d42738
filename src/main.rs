use std::net::SocketAddr;
use std::sync::Arc;

use craft_auth::{
    auth::{
        AuthService, PasswordPolicy, PasswordService, PgUserStore, RevocationList, TokenService,
        VerificationTokens,
    },
    config::AppConfig,
    create_router, db,
    store::{KeyValueStore, MemoryStore, RedisStore},
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // RUST_LOG controls verbosity, info by default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Craft Auth API - Starting...");

    // Missing or inconsistent secrets are fatal here, never per request
    let config = AppConfig::from_env().expect("Invalid configuration");

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => {
            let redis = RedisStore::connect(url)
                .await
                .expect("Failed to connect to Redis");
            redis.ping().await.expect("Redis did not answer PING");
            Arc::new(redis)
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set; verification tokens and revocations are kept in process memory"
            );
            Arc::new(MemoryStore::new())
        }
    };

    let passwords = PasswordService::new(PasswordPolicy::default(), config.hash_cost)
        .expect("Invalid password hashing parameters");
    let tokens = Arc::new(TokenService::new(
        config.access_secret.clone(),
        config.refresh_secret.clone(),
    ));

    let auth = AuthService::new(
        Arc::new(PgUserStore::new(db_pool)),
        passwords,
        tokens,
        VerificationTokens::new(kv.clone(), config.verification_ttl),
        RevocationList::new(kv),
    )
    .with_exposed_verification_tokens(config.expose_verification_token);

    if config.expose_verification_token {
        tracing::warn!("EXPOSE_VERIFICATION_TOKEN is set; do not use this in production");
    }
    if config.rate_limit.is_none() {
        tracing::warn!("Rate limiting disabled for credential routes");
    }

    // Create the application router
    let app = create_router(AppState::new(auth), config.rate_limit);

    // Start the Axum server
    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Craft Auth API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    // Peer addresses feed the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
