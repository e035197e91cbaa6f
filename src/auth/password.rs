//! Argon2id password hashing.
//!
//! The work factor is fixed when the hasher is constructed. Hashing and
//! verification run on the blocking pool so request tasks are not stalled.

use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Salted one-way password hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    hashes_computed: Arc<AtomicU64>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
            hashes_computed: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with explicit Argon2 cost parameters
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> ApiResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ApiError::Internal(format!("Invalid hashing parameters: {}", e)))?;

        Ok(Self {
            params,
            hashes_computed: Arc::new(AtomicU64::new(0)),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password into a PHC string (salt embedded)
    pub fn hash_blocking(&self, password: &str) -> ApiResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        self.hashes_computed.fetch_add(1, Ordering::Relaxed);
        Ok(hash)
    }

    /// Hash on the blocking pool
    pub async fn hash(&self, password: String) -> ApiResult<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// Check a candidate against a stored hash. A malformed hash is a mismatch.
    pub fn verify_blocking(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Verify on the blocking pool
    pub async fn verify(&self, password: String, hash: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &hash))
            .await
            .unwrap_or(false)
    }

    /// Number of hashes this hasher (and its clones) has produced
    pub fn hash_count(&self) -> u64 {
        self.hashes_computed.load(Ordering::Relaxed)
    }
}
