// User record store: Postgres for deployments, in-memory for tests

use axum::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::models::{
    ContactInformation, CraftsmanProfile, NewCraftsmanProfile, NewUser, Role, UserRecord,
    UserUpdate,
};
use crate::store::StoreError;

/// Persistence contract for accounts and craftsman profiles.
///
/// Email lookups ignore case. Inserting a second account with the same email
/// fails with `StoreError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// All accounts, oldest first
    async fn list(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Applies the `Some` fields of `update`; `None` when the user does not exist
    async fn update_fields(
        &self,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Returns whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_craftsman_profile(
        &self,
        profile: NewCraftsmanProfile,
    ) -> Result<CraftsmanProfile, StoreError>;
}

const USER_COLUMNS: &str = "id, name, surname, username, email, password_hash, role, \
                            email_verified, verified_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    surname: String,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    email_verified: bool,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| StoreError::Corrupt(format!("user {} has unknown role '{}'", row.id, row.role)))?;

        Ok(UserRecord {
            id: row.id,
            name: row.name,
            surname: row.surname,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            email_verified: row.email_verified,
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CraftsmanRow {
    id: Uuid,
    user_id: Uuid,
    bio: String,
    experience: i32,
    rating: f64,
    location: String,
    contact_info: Json<ContactInformation>,
    is_verified: bool,
    created_at: DateTime<Utc>,
}

impl From<CraftsmanRow> for CraftsmanProfile {
    fn from(row: CraftsmanRow) -> Self {
        CraftsmanProfile {
            id: row.id,
            user_id: row.user_id,
            bio: row.bio,
            experience: row.experience,
            rating: row.rating,
            location: row.location,
            contact_info: row.contact_info.0,
            is_verified: row.is_verified,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, name, surname, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.surname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        UserRecord::try_from(row)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                surname = COALESCE($3, surname), \
                username = COALESCE($4, username), \
                password_hash = COALESCE($5, password_hash), \
                email_verified = COALESCE($6, email_verified), \
                verified_at = COALESCE($7, verified_at), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.surname)
        .bind(update.username)
        .bind(update.password_hash)
        .bind(update.email_verified)
        .bind(update.verified_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_craftsman_profile(
        &self,
        profile: NewCraftsmanProfile,
    ) -> Result<CraftsmanProfile, StoreError> {
        let row = sqlx::query_as::<_, CraftsmanRow>(
            "INSERT INTO craftsmen (id, user_id, bio, experience, rating, location, contact_info) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, user_id, bio, experience, rating, location, contact_info, is_verified, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(profile.user_id)
        .bind(&profile.bio)
        .bind(profile.experience)
        .bind(profile.rating)
        .bind(&profile.location)
        .bind(Json(&profile.contact_info))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    users: HashMap<Uuid, UserRecord>,
    profiles: HashMap<Uuid, CraftsmanProfile>,
}

/// Map-backed user store for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    state: Arc<RwLock<InMemoryState>>,
    fail_profile_inserts: Arc<AtomicBool>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following profile insert fail with a transport error
    pub fn fail_profile_inserts(&self, fail: bool) {
        self.fail_profile_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn profile_count(&self) -> usize {
        self.state.read().await.profiles.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let state = self.state.read().await;
        let mut users: Vec<UserRecord> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            surname: user.surname,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            email_verified: false,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(surname) = update.surname {
            user.surname = surname;
        }
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(email_verified) = update.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(verified_at) = update.verified_at {
            user.verified_at = Some(verified_at);
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.profiles.retain(|_, profile| profile.user_id != id);
        Ok(state.users.remove(&id).is_some())
    }

    async fn insert_craftsman_profile(
        &self,
        profile: NewCraftsmanProfile,
    ) -> Result<CraftsmanProfile, StoreError> {
        if self.fail_profile_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("profile insert failed".to_string()));
        }

        let mut state = self.state.write().await;
        if !state.users.contains_key(&profile.user_id) {
            return Err(StoreError::Conflict(format!(
                "no account {} for craftsman profile",
                profile.user_id
            )));
        }

        let created = CraftsmanProfile {
            id: Uuid::new_v4(),
            user_id: profile.user_id,
            bio: profile.bio,
            experience: profile.experience,
            rating: profile.rating,
            location: profile.location,
            contact_info: profile.contact_info,
            is_verified: false,
            created_at: Utc::now(),
        };
        state.profiles.insert(created.id, created.clone());
        Ok(created)
    }
}
