/// Account database models and operations
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::fmt;

/// Reference to an asset held by the media store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub public_id: String,
    pub url: String,
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media reference columns on an account row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Avatar,
    CoverImage,
}

impl MediaSlot {
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            MediaSlot::Avatar => ("avatar_id", "avatar_url"),
            MediaSlot::CoverImage => ("cover_image_id", "cover_image_url"),
        }
    }
}

/// Account record
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<MediaRef>,
    pub cover_image: Option<MediaRef>,
    pub role: Role,
    pub refresh_token: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Plaintext waiting to be hashed by the next persist
    pending_password: Option<String>,
}

impl Account {
    /// A new, unsaved account. The password is hashed on first persist.
    pub fn new(name: String, username: String, email: String, password: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            username,
            email,
            password_hash: String::new(),
            avatar: None,
            cover_image: None,
            role: Role::User,
            refresh_token: None,
            reset_password_token: None,
            reset_password_expiry: None,
            created_at: now,
            updated_at: now,
            pending_password: Some(password),
        }
    }

    /// Replace the password; takes effect when the account is next persisted
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.pending_password = Some(password.into());
    }

    /// Whether the password changed since the last persist
    pub fn password_changed(&self) -> bool {
        self.pending_password.is_some()
    }

    pub(crate) fn take_pending_password(&mut self) -> Option<String> {
        self.pending_password.take()
    }

    /// Lower-case the unique login fields
    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_lowercase();
        self.email = self.email.trim().to_lowercase();
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Account as exposed over the API: no password hash, no tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<MediaRef>,
    pub cover_image: Option<MediaRef>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for PublicAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            avatar: account.avatar.clone(),
            cover_image: account.cover_image.clone(),
            role: account.role,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

impl From<Account> for PublicAccount {
    fn from(account: Account) -> Self {
        PublicAccount::from(&account)
    }
}

/// Persistence seam for accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Account>>;

    /// Match against username or email
    async fn find_by_login(&self, login: &str) -> ApiResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> ApiResult<Option<Account>>;

    /// Account whose stored reset digest matches and has not expired at `now`
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Account>>;

    async fn insert(&self, account: &Account) -> ApiResult<()>;

    /// Write name, username and email. Other columns are left as stored.
    async fn set_profile(&self, account: &Account) -> ApiResult<()>;

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> ApiResult<()>;

    /// Point one media slot at an asset, or clear it
    async fn set_media(
        &self,
        id: &str,
        slot: MediaSlot,
        media: Option<&MediaRef>,
    ) -> ApiResult<()>;

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> ApiResult<()>;

    async fn set_reset_token(
        &self,
        id: &str,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> ApiResult<()>;

    /// Atomically write the new hash and clear the reset pair and refresh
    /// token, only if the reset digest still matches and is unexpired.
    /// Returns whether the account was updated.
    async fn complete_password_reset(
        &self,
        id: &str,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<bool>;

    async fn set_role(&self, id: &str, role: Role) -> ApiResult<bool>;

    async fn list(&self) -> ApiResult<Vec<Account>>;

    async fn delete(&self, id: &str) -> ApiResult<bool>;
}

const ACCOUNT_COLUMNS: &str = "id, name, username, email, password_hash, avatar_id, avatar_url,
     cover_image_id, cover_image_url, role, refresh_token, reset_password_token,
     reset_password_expiry, created_at, updated_at";

fn media_from_row(row: &SqliteRow, id_col: &str, url_col: &str) -> ApiResult<Option<MediaRef>> {
    let id: Option<String> = row.try_get(id_col)?;
    let url: Option<String> = row.try_get(url_col)?;

    Ok(match (id, url) {
        (Some(public_id), Some(url)) => Some(MediaRef { public_id, url }),
        _ => None,
    })
}

fn account_from_row(row: &SqliteRow) -> ApiResult<Account> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::Internal(format!("Unknown role stored: {}", role)))?;

    let expiry: Option<i64> = row.try_get("reset_password_expiry")?;

    Ok(Account {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        avatar: media_from_row(row, "avatar_id", "avatar_url")?,
        cover_image: media_from_row(row, "cover_image_id", "cover_image_url")?,
        role,
        refresh_token: row.try_get("refresh_token")?,
        reset_password_token: row.try_get("reset_password_token")?,
        reset_password_expiry: expiry.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        pending_password: None,
    })
}

/// SQLite-backed account store
#[derive(Clone)]
pub struct SqliteAccountStore {
    db: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(&self, clause: &str, binds: &[&str]) -> ApiResult<Option<Account>> {
        let sql = format!("SELECT {} FROM account WHERE {}", ACCOUNT_COLUMNS, clause);
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        query
            .fetch_optional(&self.db)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Account>> {
        self.fetch_one_where("id = ?1", &[id]).await
    }

    async fn find_by_login(&self, login: &str) -> ApiResult<Option<Account>> {
        self.fetch_one_where("username = ?1 OR email = ?1", &[login])
            .await
    }

    async fn find_by_email(&self, email: &str) -> ApiResult<Option<Account>> {
        self.fetch_one_where("email = ?1", &[email]).await
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM account
             WHERE reset_password_token = ?1 AND reset_password_expiry > ?2",
            ACCOUNT_COLUMNS
        );

        sqlx::query(&sql)
            .bind(token_hash)
            .bind(now.timestamp_millis())
            .fetch_optional(&self.db)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    async fn insert(&self, account: &Account) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO account (id, name, username, email, password_hash, avatar_id, avatar_url,
                                  cover_image_id, cover_image_url, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.avatar.as_ref().map(|m| m.public_id.as_str()))
        .bind(account.avatar.as_ref().map(|m| m.url.as_str()))
        .bind(account.cover_image.as_ref().map(|m| m.public_id.as_str()))
        .bind(account.cover_image.as_ref().map(|m| m.url.as_str()))
        .bind(account.role.as_str())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn set_profile(&self, account: &Account) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE account SET name = ?1, username = ?2, email = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(&account.name)
        .bind(&account.username)
        .bind(&account.email)
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        Ok(())
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> ApiResult<()> {
        let result =
            sqlx::query("UPDATE account SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        Ok(())
    }

    async fn set_media(
        &self,
        id: &str,
        slot: MediaSlot,
        media: Option<&MediaRef>,
    ) -> ApiResult<()> {
        let (id_col, url_col) = slot.columns();
        let sql = format!(
            "UPDATE account SET {} = ?1, {} = ?2, updated_at = ?3 WHERE id = ?4",
            id_col, url_col
        );

        let result = sqlx::query(&sql)
            .bind(media.map(|m| m.public_id.as_str()))
            .bind(media.map(|m| m.url.as_str()))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        Ok(())
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> ApiResult<()> {
        sqlx::query("UPDATE account SET refresh_token = ?1 WHERE id = ?2")
            .bind(token)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> ApiResult<()> {
        let (hash, expiry) = match token {
            Some((hash, expires_at)) => (Some(hash), Some(expires_at.timestamp_millis())),
            None => (None, None),
        };

        sqlx::query(
            "UPDATE account SET reset_password_token = ?1, reset_password_expiry = ?2 WHERE id = ?3",
        )
        .bind(hash)
        .bind(expiry)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: &str,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE account
             SET password_hash = ?1, reset_password_token = NULL, reset_password_expiry = NULL,
                 refresh_token = NULL, updated_at = ?2
             WHERE id = ?3 AND reset_password_token = ?4 AND reset_password_expiry > ?5",
        )
        .bind(password_hash)
        .bind(now)
        .bind(id)
        .bind(token_hash)
        .bind(now.timestamp_millis())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_role(&self, id: &str, role: Role) -> ApiResult<bool> {
        let result = sqlx::query("UPDATE account SET role = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self) -> ApiResult<Vec<Account>> {
        let sql = format!(
            "SELECT {} FROM account ORDER BY created_at DESC",
            ACCOUNT_COLUMNS
        );

        sqlx::query(&sql)
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(account_from_row)
            .collect()
    }

    async fn delete(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM account WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Duration;

    fn sample(username: &str, email: &str) -> Account {
        let mut account = Account::new(
            "Sample".to_string(),
            username.to_string(),
            email.to_string(),
            "secret1".to_string(),
        );
        account.password_hash = "hash".to_string();
        account
    }

    #[tokio::test]
    async fn test_insert_and_find_by_login() {
        let store = SqliteAccountStore::new(test_pool().await);
        let account = sample("alice", "alice@example.com");
        store.insert(&account).await.unwrap();

        let by_username = store.find_by_login("alice").await.unwrap().unwrap();
        let by_email = store.find_by_login("alice@example.com").await.unwrap().unwrap();

        assert_eq!(by_username.id, account.id);
        assert_eq!(by_email.id, account.id);
        assert!(!by_username.password_changed());
        assert!(store.find_by_login("ALICE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let store = SqliteAccountStore::new(test_pool().await);
        store.insert(&sample("bob", "bob@example.com")).await.unwrap();

        let err = store
            .insert(&sample("bob", "other@example.com"))
            .await
            .unwrap_err();

        match err {
            ApiError::Conflict(message) => assert!(message.contains("username")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_token_lookup_respects_expiry() {
        let store = SqliteAccountStore::new(test_pool().await);
        let account = sample("carol", "carol@example.com");
        store.insert(&account).await.unwrap();

        let now = Utc::now();
        store
            .set_reset_token(&account.id, Some(("digest", now + Duration::minutes(15))))
            .await
            .unwrap();

        assert!(store.find_by_reset_token("digest", now).await.unwrap().is_some());
        assert!(store
            .find_by_reset_token("digest", now + Duration::minutes(16))
            .await
            .unwrap()
            .is_none());
        assert!(store.find_by_reset_token("other", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_password_reset_is_single_use() {
        let store = SqliteAccountStore::new(test_pool().await);
        let account = sample("dave", "dave@example.com");
        store.insert(&account).await.unwrap();
        store
            .set_refresh_token(&account.id, Some("refresh"))
            .await
            .unwrap();

        let now = Utc::now();
        store
            .set_reset_token(&account.id, Some(("digest", now + Duration::minutes(15))))
            .await
            .unwrap();

        assert!(store
            .complete_password_reset(&account.id, "digest", "new-hash", now)
            .await
            .unwrap());
        assert!(!store
            .complete_password_reset(&account.id, "digest", "newer-hash", now)
            .await
            .unwrap());

        let stored = store.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expiry.is_none());
        assert!(stored.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_set_media_touches_one_slot() {
        let store = SqliteAccountStore::new(test_pool().await);
        let account = sample("erin", "erin@example.com");
        store.insert(&account).await.unwrap();

        let avatar = MediaRef {
            public_id: "avatars/1".to_string(),
            url: "http://media/avatars/1".to_string(),
        };
        store
            .set_media(&account.id, MediaSlot::Avatar, Some(&avatar))
            .await
            .unwrap();

        let stored = store.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.avatar, Some(avatar));
        assert!(stored.cover_image.is_none());

        store
            .set_media(&account.id, MediaSlot::Avatar, None)
            .await
            .unwrap();
        let stored = store.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(stored.avatar.is_none());
    }

    #[tokio::test]
    async fn test_set_profile_leaves_secrets_and_role() {
        let store = SqliteAccountStore::new(test_pool().await);
        let mut account = sample("frank", "frank@example.com");
        store.insert(&account).await.unwrap();

        // Changed by someone else after `account` was read
        store.set_password_hash(&account.id, "fresh-hash").await.unwrap();
        store.set_role(&account.id, Role::Admin).await.unwrap();

        account.name = "Frank Renamed".to_string();
        store.set_profile(&account).await.unwrap();

        let stored = store.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Frank Renamed");
        assert_eq!(stored.password_hash, "fresh-hash");
        assert_eq!(stored.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_narrow_writes_on_missing_account() {
        let store = SqliteAccountStore::new(test_pool().await);
        let ghost = sample("ghost", "ghost@example.com");

        assert!(matches!(
            store.set_profile(&ghost).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            store.set_password_hash(&ghost.id, "x").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            store.set_media(&ghost.id, MediaSlot::CoverImage, None).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_role_and_delete() {
        let store = SqliteAccountStore::new(test_pool().await);
        let account = sample("frank", "frank@example.com");
        store.insert(&account).await.unwrap();

        assert!(store.set_role(&account.id, Role::Admin).await.unwrap());
        assert!(store.find_by_id(&account.id).await.unwrap().unwrap().is_admin());

        assert!(store.delete(&account.id).await.unwrap());
        assert!(!store.delete(&account.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_public_account_omits_secrets() {
        let mut account = sample("gina", "gina@example.com");
        account.refresh_token = Some("refresh".to_string());

        let json = serde_json::to_value(PublicAccount::from(&account)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["role"], "user");
    }
}
