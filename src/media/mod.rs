/// Media storage
///
/// Uploaded images leave the request through a media store, which maps a
/// staged local file to a durable `{publicId, url}` pair and can delete it
/// again by id. Stores only read staged files; removing them is the job of
/// the upload layer.

pub mod cloudinary;
pub mod disk;

pub use cloudinary::CloudinaryMediaStore;
pub use disk::DiskMediaStore;

use crate::{
    config::{MediaConfig, ServerConfig},
    db::account::MediaRef,
    error::ApiResult,
};
use async_trait::async_trait;
use std::{path::Path, sync::Arc};

/// Destination folder for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Avatar,
    CoverImage,
    FeaturedImage,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Avatar => "iblog/users/avatar",
            MediaFolder::CoverImage => "iblog/users/coverImage",
            MediaFolder::FeaturedImage => "iblog/posts/featuredImage",
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the file at `path` and return where it now lives
    async fn upload(&self, path: &Path, folder: MediaFolder) -> ApiResult<MediaRef>;

    /// Remove an asset by public id. Unknown ids are not an error.
    async fn delete(&self, public_id: &str) -> ApiResult<()>;
}

/// Build the media store selected by configuration
pub fn from_config(config: &ServerConfig) -> ApiResult<Arc<dyn MediaStore>> {
    match &config.media {
        MediaConfig::Disk { location } => Ok(Arc::new(DiskMediaStore::new(
            location.clone(),
            format!("{}/media", config.service.public_url.trim_end_matches('/')),
        ))),
        MediaConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
        } => Ok(Arc::new(CloudinaryMediaStore::new(
            cloud_name.clone(),
            api_key.clone(),
            api_secret.clone(),
        )?)),
    }
}
