/// Account lifecycle manager
///
/// `prepare` is the only place a pending plaintext password becomes a hash
/// and login fields are normalized. Writes after signup touch only the
/// columns the operation changes.
use crate::{
    account::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, PasswordChangeRequest,
        ProfileUpdateRequest, SessionTokens, SignupRequest,
    },
    auth::{
        password::PasswordHasher,
        reset::ResetTokenGenerator,
        tokens::{TokenIssuer, TokenKind},
    },
    config::ServerConfig,
    db::account::{Account, AccountStore, MediaSlot, PublicAccount, Role},
    error::{ApiError, ApiResult},
    mailer::{EmailSender, OutgoingEmail},
    media::{MediaFolder, MediaStore},
};
use chrono::{Duration, Utc};
use std::{path::Path, sync::Arc};
use validator::Validate;

const SESSION_INVALID: &str = "Token is invalid or has been expired";
const REFRESH_INVALID: &str = "Invalid refresh token or has been expired";

/// Which profile image an update replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn folder(self) -> MediaFolder {
        match self {
            ProfileImage::Avatar => MediaFolder::Avatar,
            ProfileImage::CoverImage => MediaFolder::CoverImage,
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "Please select an profile image",
            ProfileImage::CoverImage => "Please select an cover image",
        }
    }

    fn slot(self) -> MediaSlot {
        match self {
            ProfileImage::Avatar => MediaSlot::Avatar,
            ProfileImage::CoverImage => MediaSlot::CoverImage,
        }
    }
}

/// Account manager service
pub struct AccountManager {
    accounts: Arc<dyn AccountStore>,
    media: Arc<dyn MediaStore>,
    mailer: Arc<dyn EmailSender>,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    reset_tokens: ResetTokenGenerator,
    reset_base_url: String,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        media: Arc<dyn MediaStore>,
        mailer: Arc<dyn EmailSender>,
        tokens: Arc<TokenIssuer>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            accounts,
            media,
            mailer,
            tokens,
            hasher: PasswordHasher::default(),
            reset_tokens: ResetTokenGenerator::new(Duration::seconds(
                config.authentication.reset_token_expiry,
            )),
            reset_base_url: format!(
                "{}/api/v1/user/reset-password",
                config.service.public_url.trim_end_matches('/')
            ),
        }
    }

    /// Replace the password hasher
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Derive stored fields from pending changes. Runs before every write.
    async fn prepare(&self, account: &mut Account) -> ApiResult<()> {
        account.normalize();

        if let Some(password) = account.take_pending_password() {
            account.password_hash = self.hasher.hash(password).await?;
        }

        account.updated_at = Utc::now();
        Ok(())
    }

    /// Account behind an authenticated session
    async fn session_account(&self, user_id: &str) -> ApiResult<Account> {
        self.accounts
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(SESSION_INVALID.to_string()))
    }

    /// Best-effort removal of an asset no record points at any more
    async fn discard_media(&self, public_id: &str) {
        if let Err(e) = self.media.delete(public_id).await {
            tracing::warn!("Failed to discard media {}: {}", public_id, e);
        }
    }

    /// Issue both tokens and make the refresh token the only valid one
    async fn start_session(&self, user_id: &str) -> ApiResult<SessionTokens> {
        let access_token = self.tokens.issue(TokenKind::Access, user_id)?;
        let refresh_token = self.tokens.issue(TokenKind::Refresh, user_id)?;

        self.accounts
            .set_refresh_token(user_id, Some(refresh_token.as_str()))
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Resolve an access token to its account
    pub async fn authenticate(&self, access_token: &str) -> ApiResult<Account> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;
        self.session_account(&claims.user_id).await
    }

    /// Create an account. The avatar is required; the cover image is optional.
    /// Uploaded assets are discarded again if the account cannot be stored.
    pub async fn signup(
        &self,
        request: SignupRequest,
        avatar: Option<&Path>,
        cover_image: Option<&Path>,
    ) -> ApiResult<PublicAccount> {
        request.validate()?;

        let avatar = avatar
            .ok_or_else(|| ApiError::BadRequest("Please select an profile image".to_string()))?;

        let mut account = Account::new(
            request.name,
            request.username,
            request.email,
            request.password,
        );
        let mut uploaded: Vec<String> = Vec::new();

        let stored = async {
            let media = self.media.upload(avatar, MediaFolder::Avatar).await?;
            uploaded.push(media.public_id.clone());
            account.avatar = Some(media);

            if let Some(cover_image) = cover_image {
                let media = self.media.upload(cover_image, MediaFolder::CoverImage).await?;
                uploaded.push(media.public_id.clone());
                account.cover_image = Some(media);
            }

            self.prepare(&mut account).await?;
            self.accounts.insert(&account).await
        }
        .await;

        if let Err(e) = stored {
            for public_id in &uploaded {
                self.discard_media(public_id).await;
            }
            return Err(e);
        }

        tracing::info!("Created account {} ({})", account.username, account.id);
        Ok(PublicAccount::from(&account))
    }

    /// Verify credentials and open a session
    pub async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse> {
        request.validate()?;

        let account = self
            .accounts
            .find_by_login(&request.username)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("User does not exist with this username or email".to_string())
            })?;

        if !self
            .hasher
            .verify(request.password, account.password_hash.clone())
            .await
        {
            return Err(ApiError::BadRequest("Invalid credentials".to_string()));
        }

        let tokens = self.start_session(&account.id).await?;
        tracing::info!("Account {} logged in", account.id);

        Ok(LoginResponse {
            account: PublicAccount::from(&account),
            tokens,
        })
    }

    /// End the session by forgetting the refresh token
    pub async fn logout(&self, user_id: &str) -> ApiResult<()> {
        self.accounts.set_refresh_token(user_id, None).await?;
        tracing::info!("Account {} logged out", user_id);
        Ok(())
    }

    /// Trade the current refresh token for a new pair.
    ///
    /// Two refreshes racing on the same token can both pass the stored-token
    /// check; whichever writes last owns the session.
    pub async fn refresh(&self, presented: Option<String>) -> ApiResult<SessionTokens> {
        let presented = presented
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify(&presented, TokenKind::Refresh)?;

        let account = self
            .accounts
            .find_by_id(&claims.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(REFRESH_INVALID.to_string()))?;

        if account.refresh_token.as_deref() != Some(presented.as_str()) {
            return Err(ApiError::Unauthorized(REFRESH_INVALID.to_string()));
        }

        self.start_session(&account.id).await
    }

    /// Current account, sanitized
    pub async fn profile(&self, user_id: &str) -> ApiResult<PublicAccount> {
        self.session_account(user_id).await.map(PublicAccount::from)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        request: PasswordChangeRequest,
    ) -> ApiResult<()> {
        request.check()?;

        let mut account = self.session_account(user_id).await?;
        account.set_password(request.password);
        self.prepare(&mut account).await?;
        self.accounts
            .set_password_hash(&account.id, &account.password_hash)
            .await?;

        tracing::info!("Password changed for account {}", user_id);
        Ok(())
    }

    /// Issue a reset token and email it. If the email cannot be sent the
    /// token is withdrawn before the error is returned.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ApiResult<()> {
        let email = request.email.trim();
        if email.is_empty() {
            return Err(ApiError::BadRequest(
                "Please enter your email address".to_string(),
            ));
        }

        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::BadRequest("user doesn't exist with this email".to_string()))?;

        let token = self.reset_tokens.generate();
        self.accounts
            .set_reset_token(&account.id, Some((token.hash.as_str(), token.expires_at)))
            .await?;

        let message = OutgoingEmail::password_reset(
            &account.email,
            &account.name,
            &format!("{}/{}", self.reset_base_url, token.plaintext),
            self.reset_tokens.lifetime().num_minutes(),
        );

        if let Err(e) = self.mailer.send(message).await {
            tracing::warn!(
                "Reset email for account {} failed, withdrawing token: {}",
                account.id,
                e
            );
            self.accounts.set_reset_token(&account.id, None).await?;
            return Err(ApiError::EmailNotSent);
        }

        tracing::info!("Reset token issued for account {}", account.id);
        Ok(())
    }

    /// Consume a reset token. The new hash and the cleared reset fields are
    /// written in one conditional update, which also ends any open session.
    pub async fn reset_password(
        &self,
        token: &str,
        request: PasswordChangeRequest,
    ) -> ApiResult<()> {
        let digest = ResetTokenGenerator::digest(token);
        let now = Utc::now();

        let mut account = self
            .accounts
            .find_by_reset_token(&digest, now)
            .await?
            .ok_or(ApiError::ResetTokenInvalidOrExpired)?;

        request.check()?;

        account.set_password(request.password);
        self.prepare(&mut account).await?;

        let applied = self
            .accounts
            .complete_password_reset(&account.id, &digest, &account.password_hash, now)
            .await?;

        if !applied {
            return Err(ApiError::ResetTokenInvalidOrExpired);
        }

        tracing::info!("Password reset for account {}", account.id);
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: ProfileUpdateRequest,
    ) -> ApiResult<PublicAccount> {
        request.validate()?;

        let mut account = self.session_account(user_id).await?;

        if let Some(name) = request.name {
            account.name = name;
        }
        if let Some(username) = request.username {
            account.username = username;
        }
        if let Some(email) = request.email {
            account.email = email;
        }

        self.prepare(&mut account).await?;
        self.accounts.set_profile(&account).await?;
        self.profile(user_id).await
    }

    /// Replace the avatar or cover image: the old asset is deleted first,
    /// then the new one uploaded. If that upload fails the account is left
    /// without the image rather than pointing at the deleted asset.
    pub async fn update_profile_image(
        &self,
        user_id: &str,
        image: ProfileImage,
        file: Option<&Path>,
    ) -> ApiResult<PublicAccount> {
        let file = file.ok_or_else(|| ApiError::BadRequest(image.missing_message().to_string()))?;

        let account = self.session_account(user_id).await?;
        let previous = match image {
            ProfileImage::Avatar => account.avatar,
            ProfileImage::CoverImage => account.cover_image,
        };

        if let Some(previous) = previous {
            self.media.delete(&previous.public_id).await?;
        }

        match self.media.upload(file, image.folder()).await {
            Ok(media) => {
                self.accounts
                    .set_media(user_id, image.slot(), Some(&media))
                    .await?
            }
            Err(e) => {
                self.accounts.set_media(user_id, image.slot(), None).await?;
                return Err(e);
            }
        }

        self.profile(user_id).await
    }

    pub async fn list_accounts(&self) -> ApiResult<Vec<PublicAccount>> {
        Ok(self
            .accounts
            .list()
            .await?
            .iter()
            .map(PublicAccount::from)
            .collect())
    }

    pub async fn get_account(&self, id: &str) -> ApiResult<PublicAccount> {
        self.accounts
            .find_by_id(id)
            .await?
            .map(PublicAccount::from)
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))
    }

    pub async fn set_role(&self, id: &str, role: Role) -> ApiResult<PublicAccount> {
        if !self.accounts.set_role(id, role).await? {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        tracing::info!("Account {} is now {}", id, role);
        self.get_account(id).await
    }

    /// Remove an account and its profile images
    pub async fn delete_account(&self, id: &str) -> ApiResult<()> {
        let account = self
            .accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        self.accounts.delete(id).await?;

        for media in account.avatar.iter().chain(account.cover_image.iter()) {
            self.discard_media(&media.public_id).await;
        }

        tracing::info!("Deleted account {}", id);
        Ok(())
    }
}
