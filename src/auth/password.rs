//! Password hashing on top of bcrypt.
//!
//! bcrypt embeds a fresh random salt in every hash, so hashing the same
//! password twice yields different strings and both verify. Hashing is
//! CPU-bound on purpose; handlers run these through `spawn_blocking`.

use tracing::{error, warn};

pub fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    bcrypt::hash(plain, cost).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

/// Constant-effort comparison of `plain` against a stored hash. A malformed
/// stored hash is treated as "no match", never as an error the caller must
/// handle.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matched) => matched,
        Err(e) => {
            warn!(error = %e, "stored password hash did not parse");
            false
        }
    }
}
