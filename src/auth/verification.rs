// Single-use email verification tokens

use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::error::AuthError;
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "email_verify:";

/// Random bytes per token; rendered as twice as many hex characters
pub const TOKEN_BYTES: usize = 32;

/// Default lifetime of a verification token
pub const DEFAULT_VERIFICATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Issues and redeems email verification tokens.
///
/// A token maps to the email it was issued for until it is redeemed once or
/// its TTL elapses. Issuing again for the same email does not invalidate
/// earlier tokens.
#[derive(Clone)]
pub struct VerificationTokens {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl VerificationTokens {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, token)
    }

    /// Generates a fresh token for `email` and records it with the configured TTL
    pub async fn issue(&self, email: &str) -> Result<String, AuthError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.store.set(&Self::key(&token), email, self.ttl).await?;
        tracing::debug!("Issued email verification token for {}", email);
        Ok(token)
    }

    /// Consumes `token`, returning the email it was issued for.
    ///
    /// Read and delete happen in one atomic step, so two concurrent redemptions
    /// of the same token cannot both succeed.
    pub async fn redeem(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::VerificationTokenNotFound);
        }
        self.store
            .take(&Self::key(token))
            .await?
            .ok_or(AuthError::VerificationTokenNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UnreachableStore};

    fn tokens() -> (MemoryStore, VerificationTokens) {
        let store = MemoryStore::new();
        let tokens = VerificationTokens::new(Arc::new(store.clone()), DEFAULT_VERIFICATION_TTL);
        (store, tokens)
    }

    #[tokio::test]
    async fn test_issue_then_redeem() {
        let (_, tokens) = tokens();
        let token = tokens.issue("ana@example.com").await.unwrap();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tokens.redeem(&token).await.unwrap(), "ana@example.com");
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (_, tokens) = tokens();
        let token = tokens.issue("ana@example.com").await.unwrap();
        tokens.redeem(&token).await.unwrap();

        assert!(matches!(
            tokens.redeem(&token).await,
            Err(AuthError::VerificationTokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tokens() {
        let (_, tokens) = tokens();
        assert!(matches!(
            tokens.redeem("deadbeef").await,
            Err(AuthError::VerificationTokenNotFound)
        ));
        assert!(matches!(
            tokens.redeem("").await,
            Err(AuthError::VerificationTokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_token_expires_after_ttl() {
        let (store, tokens) = tokens();
        let token = tokens.issue("ana@example.com").await.unwrap();

        store.advance(Duration::from_secs(24 * 60 * 60)).await;
        assert!(matches!(
            tokens.redeem(&token).await,
            Err(AuthError::VerificationTokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_token_valid_just_before_ttl() {
        let (store, tokens) = tokens();
        let token = tokens.issue("ana@example.com").await.unwrap();

        store.advance(Duration::from_secs(24 * 60 * 60 - 60)).await;
        assert!(tokens.redeem(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_reissue_keeps_earlier_token() {
        let (store, tokens) = tokens();
        let first = tokens.issue("ana@example.com").await.unwrap();
        let second = tokens.issue("ana@example.com").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);
        assert_eq!(tokens.redeem(&first).await.unwrap(), "ana@example.com");
        assert_eq!(tokens.redeem(&second).await.unwrap(), "ana@example.com");
    }

    #[tokio::test]
    async fn test_concurrent_redeem_has_one_winner() {
        let (_, tokens) = tokens();
        let token = tokens.issue("ana@example.com").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                let token = token.clone();
                tokio::spawn(async move { tokens.redeem(&token).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(email) => {
                    assert_eq!(email, "ana@example.com");
                    successes += 1;
                }
                Err(err) => assert!(matches!(err, AuthError::VerificationTokenNotFound)),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_reported_as_missing_token() {
        let tokens = VerificationTokens::new(Arc::new(UnreachableStore), DEFAULT_VERIFICATION_TTL);
        assert!(matches!(
            tokens.issue("ana@example.com").await,
            Err(AuthError::Store(_))
        ));
        assert!(matches!(
            tokens.redeem("abc").await,
            Err(AuthError::Store(_))
        ));
    }
}
