/// Cloudinary-hosted media store
use crate::{
    db::account::MediaRef,
    error::{ApiError, ApiResult},
    media::{MediaFolder, MediaStore},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Upload API response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

/// Destroy API response
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Clone)]
pub struct CloudinaryMediaStore {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    http_client: Client,
}

impl CloudinaryMediaStore {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> ApiResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cloud_name,
            api_key,
            api_secret,
            http_client,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_BASE, self.cloud_name, action)
    }

    /// Signature over the sorted `key=value` parameters followed by the secret
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        hex::encode(Sha256::digest(format!("{}{}", joined, self.api_secret)))
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload(&self, path: &Path, folder: MediaFolder) -> ApiResult<MediaRef> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", folder.as_str()), ("timestamp", timestamp.as_str())]);

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(data).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.as_str())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("Media upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Media upload rejected ({}): {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("Invalid media upload response: {}", e)))?;

        tracing::debug!("Uploaded media {}", uploaded.public_id);

        Ok(MediaRef {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, public_id: &str) -> ApiResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .http_client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("Media delete failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Media delete rejected: {}",
                response.status()
            )));
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("Invalid media delete response: {}", e)))?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(ApiError::Internal(format!(
                "Media delete of {} returned {}",
                public_id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CloudinaryMediaStore {
        CloudinaryMediaStore::new(
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_signature_sorts_parameters() {
        let store = store();
        let a = store.sign(&[("timestamp", "1700000000"), ("folder", "iblog/users/avatar")]);
        let b = store.sign(&[("folder", "iblog/users/avatar"), ("timestamp", "1700000000")]);

        assert_eq!(a, b);
        assert_eq!(
            a,
            hex::encode(Sha256::digest(
                "folder=iblog/users/avatar&timestamp=1700000000secret"
            ))
        );
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            store().endpoint("upload"),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }
}
