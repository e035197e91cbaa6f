//! Signed, expiring session tokens.
//!
//! Access and refresh tokens are HS256 JWTs carrying `{userId, iat, exp, jti}`.
//! Each kind has its own secret, so a token of one kind never verifies as
//! the other.

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Which secret and lifetime a token is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issue, so two tokens minted in the same second still differ
    pub jti: String,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl SigningKey {
    fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Issues and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKey,
    refresh: SigningKey,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &str,
        access_lifetime: Duration,
        refresh_secret: &str,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            access: SigningKey::new(access_secret, access_lifetime),
            refresh: SigningKey::new(refresh_secret, refresh_lifetime),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.access_token_secret,
            Duration::seconds(config.access_token_expiry),
            &config.refresh_token_secret,
            Duration::seconds(config.refresh_token_expiry),
        )
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of this kind
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        self.key(kind).lifetime
    }

    /// Sign a token for the given user
    pub fn issue(&self, kind: TokenKind, user_id: &str) -> ApiResult<String> {
        let key = self.key(kind);
        let now = Utc::now();
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + key.lifetime).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn issue_access(&self, user_id: &str) -> ApiResult<String> {
        self.issue(TokenKind::Access, user_id)
    }

    pub fn issue_refresh(&self, user_id: &str) -> ApiResult<String> {
        self.issue(TokenKind::Refresh, user_id)
    }

    /// Verify signature and expiry, distinguishing expired from invalid
    pub fn verify(&self, token: &str, kind: TokenKind) -> ApiResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        decode::<TokenClaims>(token, &self.key(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::TokenInvalid,
            })
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_lifetime", &self.access.lifetime)
            .field("refresh_lifetime", &self.refresh.lifetime)
            .finish_non_exhaustive()
    }
}
