//! One-time password reset tokens.
//!
//! The plaintext goes out by email once. Only its SHA-256 digest is stored,
//! alongside an absolute expiry.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// A freshly generated reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Sent to the user, never stored
    pub plaintext: String,
    /// Stored in place of the plaintext
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResetTokenGenerator {
    lifetime: Duration,
}

impl ResetTokenGenerator {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn generate(&self) -> ResetToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);

        ResetToken {
            hash: Self::digest(&plaintext),
            plaintext,
            expires_at: Utc::now() + self.lifetime,
        }
    }

    /// Deterministic digest used for storage and lookup
    pub fn digest(plaintext: &str) -> String {
        hex::encode(Sha256::digest(plaintext.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_digest_of_plaintext() {
        let generator = ResetTokenGenerator::new(Duration::minutes(15));
        let token = generator.generate();

        assert_eq!(token.plaintext.len(), 64);
        assert_ne!(token.plaintext, token.hash);
        assert_eq!(ResetTokenGenerator::digest(&token.plaintext), token.hash);
    }

    #[test]
    fn test_tokens_are_unique() {
        let generator = ResetTokenGenerator::new(Duration::minutes(15));
        let a = generator.generate();
        let b = generator.generate();

        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_expiry_is_lifetime_from_now() {
        let generator = ResetTokenGenerator::new(Duration::minutes(15));
        let before = Utc::now();
        let token = generator.generate();

        let remaining = token.expires_at - before;
        assert!(remaining <= Duration::minutes(15) + Duration::seconds(1));
        assert!(remaining >= Duration::minutes(15) - Duration::seconds(1));
    }
}
