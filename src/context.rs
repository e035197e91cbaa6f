/// Application context and dependency injection
use crate::{
    account::AccountManager,
    auth::tokens::TokenIssuer,
    config::{MediaConfig, ServerConfig},
    content::{CategoryManager, PostManager},
    db::{
        self, account::SqliteAccountStore, category::SqliteCategoryStore, post::SqlitePostStore,
    },
    error::{ApiError, ApiResult},
    mailer::{EmailSender, Mailer},
    media::{self, MediaStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub token_issuer: Arc<TokenIssuer>,
    pub media: Arc<dyn MediaStore>,
    pub account_manager: Arc<AccountManager>,
    pub category_manager: Arc<CategoryManager>,
    pub post_manager: Arc<PostManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let media = media::from_config(&config)?;

        let mailer = Mailer::new(config.email.clone())?;
        if !mailer.is_configured() {
            tracing::warn!("SMTP not configured, password reset emails cannot be sent");
        }

        Ok(Self::with_services(config, db, media, Arc::new(mailer)))
    }

    /// Assemble the context around already-built collaborators
    pub fn with_services(
        config: ServerConfig,
        db: SqlitePool,
        media: Arc<dyn MediaStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let token_issuer = Arc::new(TokenIssuer::from_config(&config.authentication));

        let account_manager = Arc::new(AccountManager::new(
            Arc::new(SqliteAccountStore::new(db.clone())),
            media.clone(),
            mailer,
            token_issuer.clone(),
            &config,
        ));

        let categories = Arc::new(SqliteCategoryStore::new(db.clone()));
        let category_manager = Arc::new(CategoryManager::new(categories.clone()));
        let post_manager = Arc::new(PostManager::new(
            Arc::new(SqlitePostStore::new(db.clone())),
            categories,
            media.clone(),
        ));

        Self {
            config: Arc::new(config),
            db,
            token_issuer,
            media,
            account_manager,
            category_manager,
            post_manager,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> ApiResult<()> {
        let mut dirs = vec![
            &config.storage.data_directory,
            &config.storage.upload_tmp_directory,
        ];

        if let MediaConfig::Disk { location } = &config.media {
            dirs.push(location);
        }

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ApiError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
