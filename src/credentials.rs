use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::error::BankError;

/// One-way hashing and comparison of secrets (login passwords and PINs).
pub trait CredentialVerifier: Send + Sync {
    /// Hashes a secret for storage. Called before the owning record is
    /// persisted, never by the store itself.
    fn prepare(&self, secret: &str) -> Result<String, BankError>;

    /// Checks `secret` against a stored hash. A missing hash never verifies,
    /// but takes as long to reject as a real mismatch.
    fn verify(&self, secret: &str, hash: Option<&str>) -> bool;
}

/// Argon2id with a random salt per secret, encoded as a PHC string.
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    /// Verifier with the crate's default (OWASP recommended) cost.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Verifier with explicit memory (KiB), iteration and lane costs.
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, BankError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|err| BankError::internal(format!("invalid argon2 parameters: {err}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn prepare(&self, secret: &str) -> Result<String, BankError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| BankError::internal(format!("failed to hash credential: {err}")))
    }

    fn verify(&self, secret: &str, hash: Option<&str>) -> bool {
        let Some(hash) = hash else {
            let salt = SaltString::generate(&mut OsRng);
            let _ = self.argon2.hash_password(secret.as_bytes(), &salt);
            return false;
        };
        // the hash carries its own parameters, so secrets hashed under a
        // different cost still verify
        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2
                    .verify_password(secret.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
