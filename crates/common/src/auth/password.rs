//! Password hashing with bcrypt
//!
//! Hashing runs on the blocking pool so a burst of logins cannot stall
//! the async runtime.

use crate::errors::{AppError, Result};

/// bcrypt work factor for stored passwords
pub const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a plaintext password for storage
pub async fn hash_password(plain: &str) -> Result<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Hashing task failed: {}", e),
        })?
        .map_err(Into::into)
}

/// Verify a plaintext password against a stored hash
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Verification task failed: {}", e),
        })?
        .map_err(Into::into)
}
