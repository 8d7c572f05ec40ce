//! Operator console credentials.
//!
//! Only the argon2 PHC string of the operator secret is ever held in memory.
//! The plaintext arrives once, from the config file, and is hashed before
//! the file is rewritten.

use super::ConfigError;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

#[derive(Debug, Clone)]
pub struct OperatorCredentials {
    secret_hash: String,
}

impl OperatorCredentials {
    pub fn from_hash(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    pub fn hash_plaintext(plaintext: &str) -> Result<Self, ConfigError> {
        let salt = SaltString::generate(&mut OsRng);
        let secret_hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| ConfigError::HashError(e.to_string()))?
            .to_string();
        Ok(Self { secret_hash })
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    /// Check the secret presented in the admin header. A stored value that
    /// is not a PHC string matches nothing.
    pub fn verify(&self, presented: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    }
}
