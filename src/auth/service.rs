// Authentication service - business logic layer

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{
        AuthResponse, CraftsmanAuthResponse, LoginRequest, NewCraftsmanProfile, NewUser,
        RefreshResponse, RegisterCraftsmanRequest, RegisterRequest, Role, TokenPair,
        UpdateUserRequest, UserRecord, UserResponse, UserUpdate, VerificationSentResponse,
    },
    password::PasswordService,
    repository::UserStore,
    revocation::RevocationList,
    token::{DisplayAttributes, TokenService},
    verification::VerificationTokens,
};
use crate::store::StoreError;

/// Authentication service coordinating all auth operations
///
/// Holds no per-request state; every collaborator is injected at startup.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    verification: VerificationTokens,
    revocations: RevocationList,
    expose_verification_token: bool,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        users: Arc<dyn UserStore>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
        verification: VerificationTokens,
        revocations: RevocationList,
    ) -> Self {
        Self {
            users,
            passwords,
            tokens,
            verification,
            revocations,
            expose_verification_token: false,
        }
    }

    /// Return issued verification tokens in the send response (development only)
    pub fn with_exposed_verification_tokens(mut self, expose: bool) -> Self {
        self.expose_verification_token = expose;
        self
    }

    pub fn tokens(&self) -> Arc<TokenService> {
        self.tokens.clone()
    }

    pub fn revocations(&self) -> RevocationList {
        self.revocations.clone()
    }

    /// Register a new customer account
    ///
    /// Field shapes are checked at the HTTP boundary; this enforces the password
    /// policy and email uniqueness.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let user = self.create_account(&request, Role::Customer).await?;

        match self.issue_tokens(&user) {
            Ok(tokens) => {
                info!("Registered customer {}", user.id);
                Ok(AuthResponse::new(tokens, UserResponse::from(user)))
            }
            Err(err) => {
                self.rollback_account(user.id).await;
                Err(err)
            }
        }
    }

    /// Register a craftsman account together with its profile.
    ///
    /// All or nothing: if the profile cannot be stored the account is deleted
    /// again before the error is returned.
    pub async fn register_craftsman(
        &self,
        request: RegisterCraftsmanRequest,
    ) -> Result<CraftsmanAuthResponse, AuthError> {
        let user = self
            .create_account(&request.account(), Role::Craftsman)
            .await?;

        let profile = NewCraftsmanProfile {
            user_id: user.id,
            bio: request.bio,
            experience: request.experience,
            rating: request.rating,
            location: request.location,
            contact_info: request.contact_info,
        };

        let outcome = async {
            let craftsman = self.users.insert_craftsman_profile(profile).await?;
            let tokens = self.issue_tokens(&user)?;
            Ok::<_, AuthError>((craftsman, tokens))
        }
        .await;

        match outcome {
            Ok((craftsman, tokens)) => {
                info!("Registered craftsman {} with profile {}", user.id, craftsman.id);
                Ok(CraftsmanAuthResponse {
                    access_token: tokens.access_token,
                    refresh_token: tokens.refresh_token,
                    user: UserResponse::from(user),
                    craftsman,
                })
            }
            Err(err) => {
                error!("Craftsman registration failed after account creation: {}", err);
                self.rollback_account(user.id).await;
                Err(err)
            }
        }
    }

    /// Login with email and password
    ///
    /// Unknown email and wrong password produce the same error after the same
    /// hashing work; only the logs tell them apart.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.passwords.verify_decoy(&request.password);
            warn!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .passwords
            .verify_password(&request.password, &user.password_hash)?
        {
            warn!("Login attempt with wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user)?;
        info!("User {} logged in", user.id);
        Ok(AuthResponse::new(tokens, UserResponse::from(user)))
    }

    /// Exchange a refresh token for a fresh access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let access_token = self.tokens.refresh_access(refresh_token).map_err(|err| {
            debug!("Refresh rejected: {}", err);
            err
        })?;
        Ok(RefreshResponse { access_token })
    }

    /// Revoke an access token until it would have expired on its own
    pub async fn logout(&self, token_id: &str, expires_at: i64) -> Result<(), AuthError> {
        // `exp` is inclusive at second resolution, so keep the entry one extra second
        let remaining = (expires_at - Utc::now().timestamp()).max(0) as u64 + 1;
        self.revocations
            .revoke(token_id, Duration::from_secs(remaining))
            .await?;
        info!("Revoked access token {}", token_id);
        Ok(())
    }

    /// Get current user information
    pub async fn me(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserResponse::from(user))
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AuthError> {
        let users = self.users.list().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Issue a verification token for the user's email.
    ///
    /// Delivery happens elsewhere; the token itself is only echoed back when
    /// the service is configured to expose it.
    pub async fn send_verification(
        &self,
        user_id: Uuid,
    ) -> Result<VerificationSentResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::EmailAlreadyVerified);
        }

        let token = self.verification.issue(&user.email).await?;
        info!(
            "Verification token issued for user {} (valid for {}s)",
            user.id,
            self.verification.ttl().as_secs()
        );

        Ok(VerificationSentResponse {
            message: "Verification email sent".to_string(),
            token: self.expose_verification_token.then_some(token),
        })
    }

    /// Redeem a verification token and mark the owning account verified.
    ///
    /// The token is spent before the account is touched. If the account update
    /// then fails the user has to request a new token.
    pub async fn verify_email(&self, token: &str) -> Result<UserResponse, AuthError> {
        let email = self.verification.redeem(token).await.map_err(|err| {
            if matches!(err, AuthError::VerificationTokenNotFound) {
                warn!("Rejected email verification token");
            }
            err
        })?;

        let user = match self.users.find_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("Verification token redeemed for an account that no longer exists");
                return Err(AuthError::UserNotFound);
            }
            Err(err) => {
                error!("Verification token spent but account lookup failed: {}", err);
                return Err(err.into());
            }
        };

        if user.email_verified {
            debug!("User {} was already verified", user.id);
            return Ok(UserResponse::from(user));
        }

        let update = UserUpdate {
            email_verified: Some(true),
            verified_at: Some(Utc::now()),
            ..Default::default()
        };
        let user = match self.users.update_fields(user.id, update).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::UserNotFound),
            Err(err) => {
                error!(
                    "Verification token spent but user {} was not updated: {}",
                    user.id, err
                );
                return Err(err.into());
            }
        };

        info!("Email verified for user {}", user.id);
        Ok(UserResponse::from(user))
    }

    /// Fetch a single account
    pub async fn get_user(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<UserResponse, AuthError> {
        authorize_account_access(caller, id)?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserResponse::from(user))
    }

    /// Apply a partial account update.
    ///
    /// A new password goes through the policy and is re-hashed; email and role
    /// are not changeable here.
    pub async fn update_user(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, AuthError> {
        authorize_account_access(caller, id)?;

        let password_hash = request
            .password
            .as_deref()
            .map(|password| self.passwords.hash_password(password))
            .transpose()?;

        let update = UserUpdate {
            name: request.name.map(|name| name.trim().to_string()),
            surname: request.surname.map(|surname| surname.trim().to_string()),
            username: request.username,
            password_hash,
            ..Default::default()
        };
        let changed_password = update.password_hash.is_some();

        let user = self
            .users
            .update_fields(id, update)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(
            "Account {} updated by {} (password changed: {})",
            user.id, caller.user_id, changed_password
        );
        Ok(UserResponse::from(user))
    }

    /// Delete an account together with any craftsman profile
    pub async fn delete_user(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<(), AuthError> {
        authorize_account_access(caller, id)?;
        if !self.users.delete(id).await? {
            return Err(AuthError::UserNotFound);
        }
        info!("Account {} deleted by {}", id, caller.user_id);
        Ok(())
    }

    async fn create_account(
        &self,
        request: &RegisterRequest,
        role: Role,
    ) -> Result<UserRecord, AuthError> {
        self.passwords.validate_password_strength(&request.password)?;

        let email = normalize_email(&request.email);
        if self.users.find_by_email(&email).await?.is_some() {
            debug!("Registration rejected: email already registered");
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.passwords.hash_password(&request.password)?;

        let new_user = NewUser {
            name: request.name.trim().to_string(),
            surname: request.surname.trim().to_string(),
            username: request.username.clone(),
            email,
            password_hash,
            role,
        };

        // A concurrent registration may win between the lookup and the insert
        self.users.insert(new_user).await.map_err(|err| match err {
            StoreError::Conflict(_) => AuthError::EmailAlreadyExists,
            other => AuthError::Store(other),
        })
    }

    fn issue_tokens(&self, user: &UserRecord) -> Result<TokenPair, AuthError> {
        let attrs = DisplayAttributes::new(user.name.clone(), user.surname.clone());
        self.tokens.issue_pair(user.id, user.role, &attrs)
    }

    async fn rollback_account(&self, user_id: Uuid) {
        match self.users.delete(user_id).await {
            Ok(_) => warn!("Rolled back account {}", user_id),
            Err(err) => error!("Failed to roll back account {}: {}", user_id, err),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Owners reach their own account, admins reach any
fn authorize_account_access(caller: &AuthenticatedUser, target: Uuid) -> Result<(), AuthError> {
    if caller.user_id == target || caller.role == Role::Admin {
        return Ok(());
    }
    warn!("User {} denied access to account {}", caller.user_id, target);
    Err(AuthError::InsufficientPermissions { actual: caller.role })
}

#[cfg(test)]
pub(crate) struct TestHarness {
    pub service: AuthService,
    pub users: crate::auth::repository::InMemoryUserStore,
    pub kv: crate::store::MemoryStore,
}

#[cfg(test)]
pub(crate) fn test_harness() -> TestHarness {
    use crate::auth::{
        password::test_password_service, repository::InMemoryUserStore,
        token::test_token_service, verification::DEFAULT_VERIFICATION_TTL,
    };
    use crate::store::MemoryStore;

    let users = InMemoryUserStore::new();
    let kv = MemoryStore::new();
    let kv_handle: Arc<dyn crate::store::KeyValueStore> = Arc::new(kv.clone());

    let service = AuthService::new(
        Arc::new(users.clone()),
        test_password_service(),
        Arc::new(test_token_service()),
        VerificationTokens::new(kv_handle.clone(), DEFAULT_VERIFICATION_TTL),
        RevocationList::new(kv_handle),
    )
    .with_exposed_verification_tokens(true);

    TestHarness { service, users, kv }
}

#[cfg(test)]
pub(crate) fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ana".to_string(),
        surname: "Novak".to_string(),
        username: "ana.novak".to_string(),
        email: email.to_string(),
        password: "Str0ng!Pass".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::ContactInformation;
    use crate::auth::password::PolicyViolation;
    use proptest::prelude::*;

    fn craftsman_request(email: &str) -> RegisterCraftsmanRequest {
        RegisterCraftsmanRequest {
            name: "Janez".to_string(),
            surname: "Kovač".to_string(),
            username: "janez.kovac".to_string(),
            email: email.to_string(),
            password: "Str0ng!Pass".to_string(),
            bio: "Furniture restoration".to_string(),
            experience: 15,
            rating: 4.8,
            location: "Kranj".to_string(),
            contact_info: ContactInformation::default(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn caller(user_id: Uuid, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id,
            role,
            token_id: "test-jti".to_string(),
            expires_at: 0,
        }
    }

    fn verify_calls() -> usize {
        crate::auth::password::VERIFY_CALLS.with(|calls| calls.get())
    }

    #[tokio::test]
    async fn test_register_login_refresh_scenario() {
        let h = test_harness();

        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.role, Role::Customer);
        assert!(!registered.user.email_verified);

        let logged_in = h
            .service
            .login(login_request("ana@example.com", "Str0ng!Pass"))
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert_ne!(logged_in.refresh_token, registered.refresh_token);

        let wrong = h
            .service
            .login(login_request("ana@example.com", "Wr0ng!Pass"))
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let refreshed = h.service.refresh(&logged_in.refresh_token).await.unwrap();
        let claims = h
            .service
            .tokens()
            .validate_access_token(&refreshed.access_token)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), registered.user.id);
        assert_eq!(claims.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_access_token_carries_display_attributes() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let claims = h
            .service
            .tokens()
            .validate_access_token(&registered.access_token)
            .unwrap();
        assert_eq!(claims.name.as_deref(), Some("Ana"));
        assert_eq!(claims.surname.as_deref(), Some("Novak"));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let h = test_harness();
        h.service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let unknown = h
            .service
            .login(login_request("nobody@example.com", "Str0ng!Pass"))
            .await
            .unwrap_err();
        let wrong = h
            .service
            .login(login_request("ana@example.com", "Str0ng!Pasz"))
            .await
            .unwrap_err();

        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.error_message(), wrong.error_message());
        assert_eq!(unknown.status_code(), wrong.status_code());
    }

    #[tokio::test]
    async fn test_unknown_email_still_runs_a_verification() {
        let h = test_harness();
        h.service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let before = verify_calls();
        let _ = h
            .service
            .login(login_request("nobody@example.com", "Str0ng!Pass"))
            .await;
        let unknown_cost = verify_calls() - before;

        let before = verify_calls();
        let _ = h
            .service
            .login(login_request("ana@example.com", "Str0ng!Pasz"))
            .await;
        let wrong_password_cost = verify_calls() - before;

        assert_eq!(unknown_cost, 1);
        assert_eq!(unknown_cost, wrong_password_cost);
    }

    #[tokio::test]
    async fn test_decoy_secret_does_not_log_in() {
        let h = test_harness();
        let err = h
            .service
            .login(login_request("nobody@example.com", "decoy-credential"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_email_is_case_insensitive() {
        let h = test_harness();
        h.service
            .register(register_request("Ana@Example.com"))
            .await
            .unwrap();
        assert!(h
            .service
            .login(login_request("ANA@EXAMPLE.COM", "Str0ng!Pass"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let h = test_harness();
        h.service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let err = h
            .service
            .register(register_request("ANA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyExists));
        assert_eq!(h.users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_weak_password_reports_first_violation() {
        let h = test_harness();
        let mut request = register_request("ana@example.com");
        request.password = "alllowercase1!".to_string();

        let err = h.service.register(request).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::PasswordPolicy(PolicyViolation::NoUpper)
        ));
        assert!(h.users.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_password_is_hashed() {
        let h = test_harness();
        h.service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let record = h
            .users
            .find_by_email("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(record.password_hash, "Str0ng!Pass");
        assert!(record.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_craftsman_creates_account_and_profile() {
        let h = test_harness();
        let response = h
            .service
            .register_craftsman(craftsman_request("janez@example.com"))
            .await
            .unwrap();

        assert_eq!(response.user.role, Role::Craftsman);
        assert_eq!(response.craftsman.user_id, response.user.id);
        assert!(!response.craftsman.is_verified);
        assert_eq!(h.users.profile_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_craftsman_rolls_back_account() {
        let h = test_harness();
        h.users.fail_profile_inserts(true);

        let err = h
            .service
            .register_craftsman(craftsman_request("janez@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
        assert!(h
            .users
            .find_by_email("janez@example.com")
            .await
            .unwrap()
            .is_none());

        // the email is free again once the store recovers
        h.users.fail_profile_inserts(false);
        assert!(h
            .service
            .register_craftsman(craftsman_request("janez@example.com"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let claims = h
            .service
            .tokens()
            .validate_access_token(&registered.access_token)
            .unwrap();

        h.service.logout(&claims.jti, claims.exp).await.unwrap();
        assert!(h.service.revocations().is_revoked(&claims.jti).await.unwrap());

        // entry lapses once the token would have expired anyway
        h.kv.advance(Duration::from_secs(15 * 60 + 2)).await;
        assert!(!h.service.revocations().is_revoked(&claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_me_and_list_users() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let me = h.service.me(registered.user.id).await.unwrap();
        assert_eq!(me.email, "ana@example.com");
        assert!(matches!(
            h.service.me(Uuid::new_v4()).await,
            Err(AuthError::UserNotFound)
        ));

        let users = h.service.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, registered.user.id);
    }

    #[tokio::test]
    async fn test_email_verification_flow() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let sent = h
            .service
            .send_verification(registered.user.id)
            .await
            .unwrap();
        let token = sent.token.unwrap();

        let verified = h.service.verify_email(&token).await.unwrap();
        assert!(verified.email_verified);
        assert!(verified.verified_at.is_some());

        // single use
        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AuthError::VerificationTokenNotFound)
        ));

        assert!(matches!(
            h.service.send_verification(registered.user.id).await,
            Err(AuthError::EmailAlreadyVerified)
        ));
    }

    #[tokio::test]
    async fn test_verification_token_hidden_by_default() {
        let h = test_harness();
        let service = h.service.clone().with_exposed_verification_tokens(false);
        let registered = service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();

        let sent = service.send_verification(registered.user.id).await.unwrap();
        assert!(sent.token.is_none());
        // still recorded for delivery
        assert_eq!(h.kv.len().await, 1);
    }

    #[tokio::test]
    async fn test_send_verification_for_missing_user() {
        let h = test_harness();
        assert!(matches!(
            h.service.send_verification(Uuid::new_v4()).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_verification_token() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let token = h
            .service
            .send_verification(registered.user.id)
            .await
            .unwrap()
            .token
            .unwrap();

        h.kv.advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AuthError::VerificationTokenNotFound)
        ));
        let me = h.service.me(registered.user.id).await.unwrap();
        assert!(!me.email_verified);
    }

    #[tokio::test]
    async fn test_verification_token_spent_when_account_is_gone() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let token = h
            .service
            .send_verification(registered.user.id)
            .await
            .unwrap()
            .token
            .unwrap();
        h.users.delete(registered.user.id).await.unwrap();

        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AuthError::VerificationTokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_owner_reads_and_updates_own_account() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let owner = caller(registered.user.id, Role::Customer);

        let fetched = h.service.get_user(&owner, registered.user.id).await.unwrap();
        assert_eq!(fetched.email, "ana@example.com");

        let updated = h
            .service
            .update_user(
                &owner,
                registered.user.id,
                UpdateUserRequest {
                    surname: Some("  Horvat ".to_string()),
                    password: Some("N3w!Secret".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.surname, "Horvat");

        // the new password replaces the old one
        assert!(h
            .service
            .login(login_request("ana@example.com", "N3w!Secret"))
            .await
            .is_ok());
        assert!(matches!(
            h.service
                .login(login_request("ana@example.com", "Str0ng!Pass"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_update_with_weak_password_changes_nothing() {
        let h = test_harness();
        let registered = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let owner = caller(registered.user.id, Role::Customer);

        let err = h
            .service
            .update_user(
                &owner,
                registered.user.id,
                UpdateUserRequest {
                    name: Some("Anja".to_string()),
                    password: Some("weakpass".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PasswordPolicy(PolicyViolation::NoUpper)
        ));
        let me = h.service.me(registered.user.id).await.unwrap();
        assert_eq!(me.name, "Ana");
    }

    #[tokio::test]
    async fn test_other_accounts_need_admin() {
        let h = test_harness();
        let ana = h
            .service
            .register(register_request("ana@example.com"))
            .await
            .unwrap();
        let bob = h
            .service
            .register(register_request("bob@example.com"))
            .await
            .unwrap();
        let as_bob = caller(bob.user.id, Role::Customer);

        assert!(matches!(
            h.service.get_user(&as_bob, ana.user.id).await,
            Err(AuthError::InsufficientPermissions { actual: Role::Customer })
        ));
        assert!(matches!(
            h.service
                .update_user(&as_bob, ana.user.id, UpdateUserRequest::default())
                .await,
            Err(AuthError::InsufficientPermissions { .. })
        ));
        assert!(matches!(
            h.service.delete_user(&as_bob, ana.user.id).await,
            Err(AuthError::InsufficientPermissions { .. })
        ));
        // a non-owner learns nothing about ids that do not exist either
        assert!(matches!(
            h.service.get_user(&as_bob, Uuid::new_v4()).await,
            Err(AuthError::InsufficientPermissions { .. })
        ));

        let admin = caller(Uuid::new_v4(), Role::Admin);
        assert!(h.service.get_user(&admin, ana.user.id).await.is_ok());
        assert!(matches!(
            h.service.get_user(&admin, Uuid::new_v4()).await,
            Err(AuthError::UserNotFound)
        ));
        h.service.delete_user(&admin, ana.user.id).await.unwrap();
        assert!(matches!(
            h.service.delete_user(&admin, ana.user.id).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_deleting_craftsman_removes_profile() {
        let h = test_harness();
        let response = h
            .service
            .register_craftsman(craftsman_request("janez@example.com"))
            .await
            .unwrap();
        let owner = caller(response.user.id, Role::Craftsman);

        h.service.delete_user(&owner, response.user.id).await.unwrap();
        assert_eq!(h.users.profile_count().await, 0);
        assert!(matches!(
            h.service.me(response.user.id).await,
            Err(AuthError::UserNotFound)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_register_then_login_yields_same_subject(local in "[a-z]{3,12}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let h = test_harness();
                let email = format!("{}@example.com", local);
                let registered = h.service.register(register_request(&email)).await.unwrap();
                let logged_in = h
                    .service
                    .login(login_request(&email, "Str0ng!Pass"))
                    .await
                    .unwrap();

                let tokens = h.service.tokens();
                let first = tokens.validate_access_token(&registered.access_token).unwrap();
                let second = tokens.validate_access_token(&logged_in.access_token).unwrap();
                assert_eq!(first.sub, second.sub);
                assert_eq!(first.role, second.role);
            });
        }
    }
}
