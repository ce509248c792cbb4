//! Credential store and session ownership index.
//!
//! The whole snapshot lives in memory behind one async mutex. Every mutation
//! is applied to a copy, written to disk, and committed only once the write
//! succeeded, so concurrent requests in this process never lose updates and a
//! failed save never leaves memory ahead of the file.

pub mod file;
pub mod password;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("{0}")]
    Persistence(String),
}

/// One account in the users file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub username: String,
    /// Argon2 PHC string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Plaintext password left behind by older gateway versions. Replaced by
    /// `password_hash` on the first successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `None` until the first session is linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<String>>,
}

impl UserRecord {
    pub fn with_password(username: &str, plain: &str) -> Result<Self, StoreError> {
        let mut record = Self {
            username: username.to_string(),
            password_hash: None,
            password: None,
            sessions: Some(Vec::new()),
        };
        record.set_password(plain)?;
        Ok(record)
    }

    fn set_password(&mut self, plain: &str) -> Result<(), StoreError> {
        let hash = password::hash_password(plain).map_err(|e| StoreError::Hash(e.to_string()))?;
        self.password_hash = Some(hash);
        self.password = None;
        Ok(())
    }

    fn verify_password(&self, candidate: &str) -> bool {
        match (&self.password_hash, &self.password) {
            (Some(hash), _) => password::verify_password(candidate, hash),
            (None, Some(plain)) => password::constant_time_eq(plain, candidate),
            (None, None) => false,
        }
    }

    fn is_legacy(&self) -> bool {
        self.password_hash.is_none() && self.password.is_some()
    }

    pub fn sessions(&self) -> &[String] {
        self.sessions.as_deref().unwrap_or_default()
    }
}

pub struct CredentialStore {
    path: PathBuf,
    users: Mutex<Vec<UserRecord>>,
}

impl CredentialStore {
    /// Load the snapshot at `path`. A missing or corrupt file opens as an
    /// empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = file::load(&path).await;
        tracing::info!(
            "Credential store ready: {} ({} users)",
            path.display(),
            users.len()
        );
        Self {
            path,
            users: Mutex::new(users),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of every record, in file order.
    pub async fn users(&self) -> Vec<UserRecord> {
        self.users.lock().await.clone()
    }

    async fn mutate<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> Result<T, StoreError>,
    {
        let mut guard = self.users.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        file::save(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), StoreError> {
        self.mutate(|users| {
            if users.iter().any(|u| u.username == username) {
                return Err(StoreError::UserExists(username.to_string()));
            }
            users.push(UserRecord::with_password(username, password)?);
            Ok(())
        })
        .await?;
        tracing::info!("User registered: {}", username);
        Ok(())
    }

    /// Check credentials. Legacy plaintext records that verify are upgraded to
    /// an argon2 hash; an upgrade that cannot be persisted is logged and the
    /// login still succeeds.
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let mut guard = self.users.lock().await;
        let Some(idx) = guard.iter().position(|u| u.username == username) else {
            return false;
        };
        if !guard[idx].verify_password(password) {
            return false;
        }

        if guard[idx].is_legacy() {
            let mut next = guard.clone();
            let upgraded = match next[idx].set_password(password) {
                Ok(()) => file::save(&self.path, &next).await,
                Err(e) => Err(e),
            };
            match upgraded {
                Ok(()) => {
                    *guard = next;
                    tracing::info!("Upgraded plaintext credential for {}", username);
                }
                Err(e) => tracing::warn!("Failed to upgrade credential for {}: {}", username, e),
            }
        }
        true
    }

    /// Link `session_id` to `username`. Adding an already linked session is a no-op.
    pub async fn add_session(&self, username: &str, session_id: &str) -> Result<(), StoreError> {
        self.mutate(|users| {
            let user = users
                .iter_mut()
                .find(|u| u.username == username)
                .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
            let sessions = user.sessions.get_or_insert_with(Vec::new);
            if !sessions.iter().any(|s| s == session_id) {
                sessions.push(session_id.to_string());
            }
            Ok(())
        })
        .await?;
        tracing::debug!("Session {} linked to {}", session_id, username);
        Ok(())
    }

    /// Unlink `session_id` from `username`. Absent sessions are a no-op.
    pub async fn remove_session(
        &self,
        username: &str,
        session_id: &str,
    ) -> Result<(), StoreError> {
        self.mutate(|users| {
            let user = users
                .iter_mut()
                .find(|u| u.username == username)
                .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
            if let Some(sessions) = user.sessions.as_mut() {
                sessions.retain(|s| s != session_id);
            }
            Ok(())
        })
        .await?;
        tracing::debug!("Session {} unlinked from {}", session_id, username);
        Ok(())
    }

    /// Sessions owned by `username`; empty for unknown users.
    pub async fn list_sessions(&self, username: &str) -> Vec<String> {
        self.users
            .lock()
            .await
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.sessions().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn temp_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json")).await;
        (dir, store)
    }

    #[tokio::test]
    async fn register_then_verify() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw1").await.unwrap();
        assert!(store.verify("alice", "pw1").await);
        assert!(!store.verify("alice", "pw2").await);
        assert!(!store.verify("nobody", "pw1").await);
    }

    #[tokio::test]
    async fn password_is_not_stored_in_plaintext() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw1").await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("pw1"));
        assert!(raw.contains("password_hash"));
    }

    #[tokio::test]
    async fn duplicate_register_keeps_one_record() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw1").await.unwrap();
        let err = store.register("alice", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::UserExists(_)));

        let reopened = CredentialStore::open(store.path()).await;
        assert_eq!(reopened.users().await.len(), 1);
        assert!(reopened.verify("alice", "pw1").await);
    }

    #[tokio::test]
    async fn add_session_is_idempotent() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw").await.unwrap();
        store.add_session("alice", "ses_1").await.unwrap();
        store.add_session("alice", "ses_1").await.unwrap();
        assert_eq!(store.list_sessions("alice").await, vec!["ses_1"]);
    }

    #[tokio::test]
    async fn add_session_for_unknown_user_fails() {
        let (_dir, store) = temp_store().await;
        let err = store.add_session("ghost", "ses_1").await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn remove_absent_session_is_noop() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw").await.unwrap();
        store.add_session("alice", "ses_1").await.unwrap();
        store.remove_session("alice", "ses_404").await.unwrap();
        assert_eq!(store.list_sessions("alice").await, vec!["ses_1"]);

        store.remove_session("alice", "ses_1").await.unwrap();
        assert!(store.list_sessions("alice").await.is_empty());
    }

    #[tokio::test]
    async fn remove_session_for_unknown_user_fails() {
        let (_dir, store) = temp_store().await;
        let err = store.remove_session("ghost", "ses_1").await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn list_sessions_for_unknown_user_is_empty() {
        let (_dir, store) = temp_store().await;
        assert!(store.list_sessions("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn legacy_record_without_sessions_is_lenient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"username": "carol", "password": "hunter2"}]"#).unwrap();
        let store = CredentialStore::open(&path).await;

        assert!(store.list_sessions("carol").await.is_empty());
        store.remove_session("carol", "ses_1").await.unwrap();
        store.add_session("carol", "ses_1").await.unwrap();
        assert_eq!(store.list_sessions("carol").await, vec!["ses_1"]);
    }

    #[tokio::test]
    async fn legacy_plaintext_is_upgraded_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"username": "carol", "password": "hunter2"}]"#).unwrap();
        let store = CredentialStore::open(&path).await;

        assert!(!store.verify("carol", "wrong").await);
        assert!(store.verify("carol", "hunter2").await);

        let users = file::load(&path).await;
        assert!(users[0].password.is_none());
        assert!(users[0].password_hash.is_some());
        assert!(store.verify("carol", "hunter2").await);
    }

    #[tokio::test]
    async fn concurrent_add_session_keeps_every_id() {
        let (_dir, store) = temp_store().await;
        store.register("alice", "pw").await.unwrap();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.add_session("alice", &format!("ses_{i}")).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.list_sessions("alice").await.len(), 16);
        let reopened = CredentialStore::open(store.path()).await;
        assert_eq!(reopened.list_sessions("alice").await.len(), 16);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = CredentialStore::open(&path).await;
        store.register("alice", "pw").await.unwrap();

        // Replace the snapshot with a directory so the next rename fails.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let err = store.add_session("alice", "ses_1").await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.list_sessions("alice").await.is_empty());
    }
}
