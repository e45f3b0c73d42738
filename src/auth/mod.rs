// Authentication module
// Password policy, JWT issuing, email verification, and the request gate

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod revocation;
pub mod service;
pub mod token;
pub mod verification;

// Re-export commonly used types
pub use error::AuthError;
pub use middleware::{require_auth, AuthGate, AuthenticatedUser, RequireRole};
pub use models::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, Role, UpdateUserRequest,
    UserResponse,
};
pub use password::{PasswordPolicy, PasswordService, PolicyViolation};
pub use repository::{InMemoryUserStore, PgUserStore, UserStore};
pub use revocation::RevocationList;
pub use service::AuthService;
pub use token::{decode_claims, Claims, TokenKind, TokenService};
pub use verification::VerificationTokens;
