//! Test doubles shared by unit tests

use crate::{
    db::account::{Account, AccountStore, MediaRef, Role, SqliteAccountStore},
    error::{ApiError, ApiResult},
    mailer::{EmailSender, OutgoingEmail},
    media::{MediaFolder, MediaStore},
};
use async_trait::async_trait;
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

/// A call observed by `RecordingMediaStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    Upload(MediaFolder),
    Delete(String),
}

/// Media store that records calls and hands out sequential ids
#[derive(Default)]
pub struct RecordingMediaStore {
    calls: Mutex<Vec<MediaCall>>,
    counter: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl RecordingMediaStore {
    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn upload(&self, path: &Path, folder: MediaFolder) -> ApiResult<MediaRef> {
        self.calls.lock().unwrap().push(MediaCall::Upload(folder));

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ApiError::Internal("upload refused".to_string()));
        }
        if !path.exists() {
            return Err(ApiError::Internal(format!("{} missing", path.display())));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = format!("{}/{}", folder.as_str(), n);
        Ok(MediaRef {
            url: format!("https://media.test/{}", public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> ApiResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(MediaCall::Delete(public_id.to_string()));
        Ok(())
    }
}

/// Mailer that keeps sent messages, or fails every send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> ApiResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Internal("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Write a small file standing in for a staged upload
pub fn staged_file(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"image bytes").unwrap();
    path
}

/// Insert an account directly, skipping password hashing
pub async fn seed_account(pool: &sqlx::SqlitePool, username: &str, role: Role) -> Account {
    let mut account = Account::new(
        "Seeded User".to_string(),
        username.to_string(),
        format!("{}@example.com", username),
        "secret1".to_string(),
    );
    account.password_hash = "not-a-hash".to_string();
    account.role = role;
    SqliteAccountStore::new(pool.clone())
        .insert(&account)
        .await
        .unwrap();
    account
}
