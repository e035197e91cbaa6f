/// Configuration management for the iBlog server
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Externally reachable base URL, used in reset links and local media URLs
    pub public_url: String,
    pub upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Where multipart file parts are staged before reaching the media store
    pub upload_tmp_directory: PathBuf,
}

/// Media store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MediaConfig {
    Disk {
        location: PathBuf,
    },
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_secret: String,
    /// Access token lifetime in seconds
    pub access_token_expiry: i64,
    pub refresh_token_secret: String,
    /// Refresh token lifetime in seconds
    pub refresh_token_expiry: i64,
    /// Reset token lifetime in seconds
    pub reset_token_expiry: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("IBLOG_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("IBLOG_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ApiError::Internal("Invalid port number".to_string()))?;
        let public_url = env::var("IBLOG_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let upload_limit = env::var("IBLOG_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5242880);

        let data_directory: PathBuf = env::var("IBLOG_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("IBLOG_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("iblog.sqlite"));
        let upload_tmp_directory = env::var("IBLOG_UPLOAD_TMP_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("tmp"));

        let media = if let Ok(cloud_name) = env::var("CLOUDINARY_CLOUD_NAME") {
            MediaConfig::Cloudinary {
                cloud_name,
                api_key: env::var("CLOUDINARY_API_KEY")
                    .map_err(|_| ApiError::Internal("Cloudinary API key required".to_string()))?,
                api_secret: env::var("CLOUDINARY_API_SECRET").map_err(|_| {
                    ApiError::Internal("Cloudinary API secret required".to_string())
                })?,
            }
        } else {
            MediaConfig::Disk {
                location: env::var("IBLOG_MEDIA_DIRECTORY")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("media")),
            }
        };

        let access_token_secret = env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| ApiError::Internal("ACCESS_TOKEN_SECRET required".to_string()))?;
        let refresh_token_secret = env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| ApiError::Internal("REFRESH_TOKEN_SECRET required".to_string()))?;
        let access_token_expiry = env::var("ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);
        let refresh_token_expiry = env::var("REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "864000".to_string())
            .parse()
            .unwrap_or(864000);
        let reset_token_expiry = env::var("RESET_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        let email = if let Ok(smtp_url) = env::var("SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("SMTP_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                database,
                upload_tmp_directory,
            },
            media,
            authentication: AuthConfig {
                access_token_secret,
                access_token_expiry,
                refresh_token_secret,
                refresh_token_expiry,
                reset_token_expiry,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Internal("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.access_token_secret.len() < 32 || auth.refresh_token_secret.len() < 32 {
            return Err(ApiError::Internal(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }

        if auth.access_token_secret == auth.refresh_token_secret {
            return Err(ApiError::Internal(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        if auth.access_token_expiry <= 0
            || auth.refresh_token_expiry <= 0
            || auth.reset_token_expiry <= 0
        {
            return Err(ApiError::Internal(
                "Token expiries must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
