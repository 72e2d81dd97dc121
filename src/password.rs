//! Argon2id password hashing and verification.
//!
//! Hashes are stored as PHC strings, so the algorithm parameters and salt travel
//! with the hash itself.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::{CatalogError, CatalogResult};

/// Hash a plaintext password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> CatalogResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CatalogError::Hashing(e.to_string()))
}

/// Verify a plaintext password against a stored PHC hash.
///
/// `Ok(false)` means the password does not match; `Err` means the stored hash is unusable.
pub fn verify_password(password: &str, hash: &str) -> CatalogResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| CatalogError::Hashing(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CatalogError::Hashing(e.to_string())),
    }
}
