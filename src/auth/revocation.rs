// Revoked access tokens, keyed by token id

use std::sync::Arc;
use std::time::Duration;

use crate::auth::error::AuthError;
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "revoked_token:";

/// Records token ids that must no longer authenticate.
///
/// Entries expire with the token they revoke, so the list never outgrows the
/// set of still-valid tokens.
#[derive(Clone)]
pub struct RevocationList {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationList {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(jti: &str) -> String {
        format!("{}{}", KEY_PREFIX, jti)
    }

    /// Revokes `jti` for `remaining`, the time left before the token expires anyway
    pub async fn revoke(&self, jti: &str, remaining: Duration) -> Result<(), AuthError> {
        if remaining.is_zero() {
            return Ok(());
        }
        self.store.set(&Self::key(jti), "1", remaining).await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self.store.get(&Self::key(jti)).await?.is_some())
    }
}
