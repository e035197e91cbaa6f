/// Staged multipart uploads
///
/// File parts of a multipart request are streamed into the configured temp
/// directory before any handler logic runs. `StagedUploads` owns those files
/// for the rest of the request: each one is removed exactly once, either by
/// an explicit `cleanup` or when the owner is dropped on any exit path.
use crate::{
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// A file written to local storage for the lifetime of one request
#[derive(Debug)]
pub struct StagedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
    path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Every file staged for the current request
#[derive(Debug, Default)]
pub struct StagedUploads {
    files: Vec<StagedFile>,
}

impl StagedUploads {
    pub fn push(&mut self, file: StagedFile) {
        self.files.push(file);
    }

    /// First file received under `field`
    pub fn get(&self, field: &str) -> Option<&StagedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// Local path of the first file received under `field`
    pub fn path(&self, field: &str) -> Option<&Path> {
        self.get(field).map(StagedFile::path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Local paths of every staged file
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path().to_path_buf()).collect()
    }

    /// Remove every staged file now. A file that is already gone is logged,
    /// not treated as a failure. Returns how many files were removed.
    pub fn cleanup(mut self) -> usize {
        let mut removed = 0;

        for file in self.files.drain(..) {
            let shown = file.path().display().to_string();
            match file.path.close() {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!("Staged upload {} was already removed", shown);
                }
                Err(e) => {
                    tracing::warn!("Failed to remove staged upload {}: {}", shown, e);
                }
            }
        }

        removed
    }
}

/// Multipart request body with its text fields and staged files
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: StagedUploads,
}

impl MultipartForm {
    /// Text field value, if present
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Owned text field value, empty when absent
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }
}

/// Stream one file part into a new temp file inside `dir`
async fn stage_field(
    dir: &Path,
    mut field: axum::extract::multipart::Field<'_>,
) -> ApiResult<StagedFile> {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);

    let suffix = file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    let (file, path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::debug!("Staged upload {} ({} bytes) at {}", name, size, path.display());

    Ok(StagedFile {
        field: name,
        file_name,
        content_type,
        size,
        path,
    })
}

impl MultipartForm {
    /// Read every part of `multipart`, staging file parts under `dir`.
    /// On error, anything staged so far is removed with the partial form.
    pub async fn read(mut multipart: Multipart, dir: &Path) -> ApiResult<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            if field.file_name().is_some() {
                let staged = stage_field(dir, field).await?;
                form.files.push(staged);
            } else {
                let name = field.name().unwrap_or_default().to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl FromRequest<AppContext> for MultipartForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppContext) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Expected multipart form data: {}", e)))?;

        MultipartForm::read(multipart, &state.config.storage.upload_tmp_directory).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn staged(dir: &Path, field: &str) -> StagedFile {
        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)
            .unwrap();
        std::fs::write(temp.path(), b"data").unwrap();

        StagedFile {
            field: field.to_string(),
            file_name: Some(format!("{}.png", field)),
            content_type: Some("image/png".to_string()),
            size: 4,
            path: temp.into_temp_path(),
        }
    }

    fn remaining(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_drop_removes_files() {
        let dir = tempdir().unwrap();
        {
            let mut uploads = StagedUploads::default();
            uploads.push(staged(dir.path(), "avatar"));
            uploads.push(staged(dir.path(), "coverImage"));
            assert_eq!(remaining(dir.path()), 2);
        }
        assert_eq!(remaining(dir.path()), 0);
    }

    #[test]
    fn test_cleanup_removes_each_file_once() {
        let dir = tempdir().unwrap();
        let mut uploads = StagedUploads::default();
        uploads.push(staged(dir.path(), "avatar"));
        uploads.push(staged(dir.path(), "coverImage"));

        assert_eq!(uploads.cleanup(), 2);
        assert_eq!(remaining(dir.path()), 0);
    }

    #[test]
    fn test_cleanup_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let mut uploads = StagedUploads::default();
        uploads.push(staged(dir.path(), "avatar"));

        std::fs::remove_file(uploads.path("avatar").unwrap()).unwrap();
        assert_eq!(uploads.cleanup(), 0);
    }

    #[test]
    fn test_lookup_by_field() {
        let dir = tempdir().unwrap();
        let mut uploads = StagedUploads::default();
        uploads.push(staged(dir.path(), "avatar"));

        assert!(uploads.path("avatar").is_some());
        assert!(uploads.path("coverImage").is_none());
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads.get("avatar").unwrap().size, 4);
    }
}
