/// Disk-based media store
use crate::{
    db::account::MediaRef,
    error::{ApiError, ApiResult},
    media::{MediaFolder, MediaStore},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Disk media store
///
/// Copies staged files under the media root with directory sharding on the
/// first two characters of a generated name, so no single directory grows
/// without bound. The public id is the path relative to the root, and the
/// URL is that id appended to the base URL the root is served under.
#[derive(Clone)]
pub struct DiskMediaStore {
    base_path: PathBuf,
    base_url: String,
}

impl DiskMediaStore {
    pub fn new(base_path: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            base_path,
            base_url: base_url.into(),
        }
    }

    /// {folder}/{first2chars}/{name}
    fn public_id_for(folder: MediaFolder, name: &str) -> String {
        format!("{}/{}/{}", folder.as_str(), &name[0..2], name)
    }

    /// Resolve a public id to a path, refusing anything that escapes the root
    fn media_path(&self, public_id: &str) -> ApiResult<PathBuf> {
        let relative = Path::new(public_id);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if !safe || public_id.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid media id: {}",
                public_id
            )));
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn upload(&self, path: &Path, folder: MediaFolder) -> ApiResult<MediaRef> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        let name = format!("{}{}", uuid::Uuid::new_v4().simple(), extension);

        let public_id = Self::public_id_for(folder, &name);
        let target = self.media_path(&public_id)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ApiError::Internal(format!("Failed to create media directory: {}", e))
            })?;
        }

        fs::copy(path, &target).await.map_err(|e| {
            ApiError::Internal(format!("Failed to store media {}: {}", public_id, e))
        })?;

        tracing::debug!("Stored media {}", public_id);

        Ok(MediaRef {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> ApiResult<()> {
        let media_path = self.media_path(public_id)?;

        match fs::remove_file(&media_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Internal(format!(
                "Failed to delete media {}: {}",
                public_id, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn staged(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_copies_and_leaves_source() {
        let root = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let store = DiskMediaStore::new(root.path().to_path_buf(), "http://localhost:5000/media");

        let source = staged(tmp.path(), "avatar.PNG", b"png bytes");
        let media = store.upload(&source, MediaFolder::Avatar).await.unwrap();

        assert!(media.public_id.starts_with("iblog/users/avatar/"));
        assert!(media.public_id.ends_with(".png"));
        assert_eq!(
            media.url,
            format!("http://localhost:5000/media/{}", media.public_id)
        );
        assert_eq!(
            std::fs::read(root.path().join(&media.public_id)).unwrap(),
            b"png bytes"
        );
        assert!(source.exists());
    }

    #[test]
    fn test_directory_sharding() {
        let id = DiskMediaStore::public_id_for(MediaFolder::CoverImage, "abcdef.jpg");
        assert_eq!(id, "iblog/users/coverImage/ab/abcdef.jpg");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let root = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let store = DiskMediaStore::new(root.path().to_path_buf(), "http://localhost/media");

        let source = staged(tmp.path(), "cover.jpg", b"jpg");
        let media = store.upload(&source, MediaFolder::CoverImage).await.unwrap();

        store.delete(&media.public_id).await.unwrap();
        assert!(!root.path().join(&media.public_id).exists());
        store.delete(&media.public_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let root = tempdir().unwrap();
        let store = DiskMediaStore::new(root.path().to_path_buf(), "http://localhost/media");

        assert!(store.delete("../outside.txt").await.is_err());
        assert!(store.delete("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let root = tempdir().unwrap();
        let store = DiskMediaStore::new(root.path().to_path_buf(), "http://localhost/media");

        let result = store
            .upload(Path::new("/nonexistent/file.png"), MediaFolder::FeaturedImage)
            .await;
        assert!(result.is_err());
    }
}
