use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::db::AppState;

/// Why a presented token was rejected. Callers treat every kind the same
/// (unauthenticated); the kinds exist so logs can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("missing subject claim")]
    MissingSubject,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// JWT payload: subject, issued-at and expiry.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Decode-side payload. `sub` stays a plain string here so an absent,
/// empty or non-UUID subject is reported as `MissingSubject` instead of
/// failing deserialization as `Malformed`.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: String,
    iat: i64,
    exp: i64,
}

/// Pre-computed signing and verification keys plus the token lifetime.
/// Built once per use from `AppState`; the secret itself is validated at
/// startup by `AppConfig::from_env`.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::days(cfg.ttl_days),
        }
    }
}

impl JwtKeys {
    /// Issues a signed token asserting `user_id` until now + ttl.
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Checks signature and expiry, then that a subject is present.
    /// Expiry is evaluated with jsonwebtoken's default 60-second leeway to
    /// tolerate clock skew between issuer and verifier.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<RawClaims>(token, &self.decoding, &Validation::default())?;
        let raw = data.claims;
        let sub = Uuid::parse_str(raw.sub.trim()).map_err(|_| TokenError::MissingSubject)?;
        if sub.is_nil() {
            return Err(TokenError::MissingSubject);
        }
        debug!(user_id = %sub, "jwt verified");
        Ok(Claims {
            sub,
            iat: raw.iat,
            exp: raw.exp,
        })
    }
}
