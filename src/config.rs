use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    /// Reads and validates configuration from the environment. A missing or
    /// empty `JWT_SECRET` and an out-of-range `BCRYPT_COST` are startup
    /// failures so they never surface as a 500 mid-request.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let ttl_days = std::env::var("TOKEN_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(15);
        if ttl_days <= 0 {
            bail!("TOKEN_TTL_DAYS must be positive, got {ttl_days}");
        }

        let bcrypt_cost = std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be within 4..=31, got {bcrypt_cost}");
        }

        Ok(Self {
            database_url,
            jwt: JwtConfig { secret, ttl_days },
            bcrypt_cost,
        })
    }
}
