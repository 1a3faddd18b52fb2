use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2 hashing failed: {0}")]
    Hash(String),
    /// A stored hash that is not a PHC string. Points at bad data, not a bad login.
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

lazy_static! {
    // Stands in for a real hash when the email is unknown, so both login
    // failures cost one argon2 verification.
    static ref DECOY_HASH: Option<String> = hash_password("decoy-Passw0rd!").ok();
}

/// Hashes with Argon2id at the crate's default (fixed) cost and a fresh salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs a full verification against a decoy hash and always reports a mismatch.
pub fn verify_decoy(plain: &str) -> bool {
    if let Some(decoy) = DECOY_HASH.as_deref() {
        let _ = verify_password(plain, decoy);
    }
    false
}
