// Password policy, hashing and verification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::Arc;
use thiserror::Error;
use unicode_general_category::{get_general_category, GeneralCategory};

use crate::auth::error::AuthError;
use crate::config::HashCost;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Rejected regardless of character mix (compared case-insensitively)
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "qwerty",
    "admin",
    "letmein",
    "welcome",
    "12345678",
    "123456789",
    "1234567890",
    "password1",
    "password123",
    "password1!",
    "passw0rd",
    "passw0rd!",
    "p@ssw0rd",
    "p@ssw0rd1",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "welcome1",
    "welcome1!",
    "welcome123",
    "admin123",
    "changeme",
    "trustno1",
];

/// First policy rule a password breaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("password must be at least 8 characters long")]
    TooShort,
    #[error("password is too common or easily guessable")]
    TooCommon,
    #[error("password must contain at least one uppercase letter")]
    NoUpper,
    #[error("password must contain at least one lowercase letter")]
    NoLower,
    #[error("password must contain at least one number")]
    NoNumber,
    #[error("password must contain at least one special character")]
    NoSpecial,
}

/// Password strength rules
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub denylist: &'static [&'static str],
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            denylist: COMMON_PASSWORDS,
        }
    }
}

impl PasswordPolicy {
    /// Checks length, then the denylist, then upper, lower, number and special
    /// characters, in that order, stopping at the first violation
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.chars().count() < self.min_length {
            return Err(PolicyViolation::TooShort);
        }

        if self.is_common(password) {
            return Err(PolicyViolation::TooCommon);
        }

        let (mut has_upper, mut has_lower, mut has_number, mut has_special) =
            (false, false, false, false);
        for c in password.chars() {
            if c.is_uppercase() {
                has_upper = true;
            } else if c.is_lowercase() {
                has_lower = true;
            } else if c.is_numeric() {
                has_number = true;
            } else if is_special(c) {
                has_special = true;
            }
        }

        if !has_upper {
            return Err(PolicyViolation::NoUpper);
        }
        if !has_lower {
            return Err(PolicyViolation::NoLower);
        }
        if !has_number {
            return Err(PolicyViolation::NoNumber);
        }
        if !has_special {
            return Err(PolicyViolation::NoSpecial);
        }

        Ok(())
    }

    fn is_common(&self, password: &str) -> bool {
        let lowered = password.to_lowercase();
        self.denylist.iter().any(|common| *common == lowered)
    }
}

/// Unicode punctuation (P*) or symbol (S*)
fn is_special(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
            | GeneralCategory::MathSymbol
            | GeneralCategory::CurrencySymbol
            | GeneralCategory::ModifierSymbol
            | GeneralCategory::OtherSymbol
    )
}

/// Password service for hashing and verification
#[derive(Clone)]
pub struct PasswordService {
    policy: PasswordPolicy,
    argon2: Argon2<'static>,
    /// Digest of a throwaway secret, hashed under this service's work factor
    decoy_digest: Arc<str>,
}

impl PasswordService {
    /// Builds an Argon2id hasher with the given work factor
    pub fn new(policy: PasswordPolicy, cost: HashCost) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::ConfigError(format!("invalid argon2 parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let decoy_digest = argon2
            .hash_password(DECOY_SECRET.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?
            .to_string();

        Ok(Self {
            policy,
            argon2,
            decoy_digest: decoy_digest.into(),
        })
    }

    /// Validate password strength requirements
    pub fn validate_password_strength(&self, password: &str) -> Result<(), PolicyViolation> {
        self.policy.validate(password)
    }

    /// Validates, then hashes with a fresh random salt.
    ///
    /// The PHC digest embeds algorithm, work factor and salt, so two calls with
    /// the same password produce different digests.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.validate_password_strength(password)?;

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))
    }

    /// Verify a password against a stored digest.
    ///
    /// Parameters come from the digest itself, so hashes made under an older
    /// work factor still verify. The final comparison is constant-time.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        #[cfg(test)]
        VERIFY_CALLS.with(|calls| calls.set(calls.get() + 1));

        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::PasswordHashError(format!("unparsable digest: {}", e)))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Spends the same work as a real verification and discards the outcome.
    ///
    /// Used when there is no stored digest to check against, so a miss costs
    /// as much as a wrong password.
    pub fn verify_decoy(&self, password: &str) {
        let _ = self.verify_password(password, &self.decoy_digest);
    }
}

const DECOY_SECRET: &str = "decoy-credential";

#[cfg(test)]
thread_local! {
    /// Verifications run on this thread, for asserting equal work across login failures
    pub(crate) static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[cfg(test)]
pub(crate) fn test_password_service() -> PasswordService {
    // Minimal work factor keeps the suite fast
    PasswordService::new(
        PasswordPolicy::default(),
        HashCost {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        },
    )
    .unwrap()
}
