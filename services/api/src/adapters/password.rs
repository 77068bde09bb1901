//! services/api/src/adapters/password.rs
//!
//! Argon2id implementation of the `PasswordService` port. Hashes are stored in
//! PHC string format, so the parameters travel with every hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use book_trading_core::ports::{PasswordService, PortError, PortResult};
use tracing::warn;

/// Memory cost in KiB.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

#[derive(Clone)]
pub struct Argon2PasswordAdapter {
    hasher: Argon2<'static>,
}

impl Argon2PasswordAdapter {
    pub fn new() -> Result<Self, argon2::Error> {
        let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, None)?;
        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordService for Argon2PasswordAdapter {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        let parsed = match PasswordHash::new(password_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };
        self.hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
