//! bcrypt password hashes.

pub use bcrypt::BcryptError;

/// Hash with the given work factor (see `SecurityConfig::password_hash_cost`)
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// `Ok(false)` for a wrong password, `Err` when the stored hash is malformed
pub fn verify_password(password: &str, stored: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, stored)
}
