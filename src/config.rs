// Application configuration loaded from the process environment
// Missing secrets are fatal at startup, never a per-request error

use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ")]
    SharedSecret,
}

/// Argon2 work factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Token-bucket settings for the public auth routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub per_second: u64,
    pub burst_size: u32,
}

/// Everything the binary needs to start
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// `None` disables rate limiting
    pub rate_limit: Option<RateLimitSettings>,
    pub hash_cost: HashCost,
    pub verification_ttl: Duration,
    pub expose_verification_token: bool,
}

impl AppConfig {
    /// Reads configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let access_secret = required("JWT_ACCESS_SECRET")?;
        let refresh_secret = required("JWT_REFRESH_SECRET")?;
        if access_secret == refresh_secret {
            return Err(ConfigError::SharedSecret);
        }
        let database_url = required("DATABASE_URL")?;
        let redis_url = lookup("REDIS_URL").filter(|value| !value.trim().is_empty());

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16)?;

        let per_second = parse_or(&lookup, "RATE_LIMIT_PER_SECOND", 2u64)?;
        let burst_size = parse_or(&lookup, "RATE_LIMIT_BURST", 5u32)?;
        let rate_limit = (per_second > 0 && burst_size > 0).then_some(RateLimitSettings {
            per_second,
            burst_size,
        });

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: defaults.parallelism,
        };

        let verification_ttl = Duration::from_secs(parse_or(
            &lookup,
            "VERIFICATION_TOKEN_TTL_SECS",
            24 * 60 * 60u64,
        )?);

        let expose_verification_token = lookup("EXPOSE_VERIFICATION_TOKEN")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            access_secret,
            refresh_secret,
            database_url,
            redis_url,
            host,
            port,
            rate_limit,
            hash_cost,
            verification_ttl,
            expose_verification_token,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            name,
            value: raw,
        }),
        None => Ok(default),
    }
}
