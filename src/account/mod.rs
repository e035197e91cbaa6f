/// Account management system
///
/// Handles signup, sessions, password changes and resets, and profile media.

mod manager;

pub use manager::{AccountManager, ProfileImage};

use crate::{
    db::account::PublicAccount,
    error::{ApiError, ApiResult},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Signup request (multipart text fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Please provide a name"))]
    pub name: String,
    #[validate(length(min = 1, message = "Please provide a username"))]
    pub username: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password should be at least of 6 characters"))]
    pub password: String,
}

/// Login request; `username` matches either username or email
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Please enter username or email"))]
    pub username: String,
    #[validate(length(min = 1, message = "Please enter password"))]
    pub password: String,
}

/// Refresh request body; the cookie takes precedence when both are present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// New password with its confirmation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub password: String,
    pub retype_password: String,
}

impl PasswordChangeRequest {
    /// Length and confirmation rules, naming the rule that failed
    pub fn check(&self) -> ApiResult<()> {
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::BadRequest(
                "Password must be of at least 6 characters".to_string(),
            ));
        }

        if self.password != self.retype_password {
            return Err(ApiError::BadRequest("Passwords did not match".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, message = "Please provide a name"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Please provide a username"))]
    pub username: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

/// Freshly issued token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login response body: the account plus its tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub account: PublicAccount,
    #[serde(flatten)]
    pub tokens: SessionTokens,
}
