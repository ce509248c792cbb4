//! On-disk snapshot of the credential store: a JSON array of user records.

use std::path::Path;

use super::{StoreError, UserRecord};

/// Read the full snapshot. Missing, empty, or unparsable files yield an empty
/// store; parse failures are logged, never surfaced.
pub async fn load(path: &Path) -> Vec<UserRecord> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read users file {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    if bytes.is_empty() {
        return Vec::new();
    }
    match serde_json::from_slice(&bytes) {
        Ok(users) => users,
        Err(e) => {
            tracing::warn!(
                "Users file {} is not valid JSON ({}), treating store as empty",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Atomic save: write to `.tmp` then rename over the snapshot.
pub async fn save(path: &Path, users: &[UserRecord]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence(path, e))?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(users).map_err(|e| persistence(path, e))?;
    tokio::fs::write(&tmp, data)
        .await
        .map_err(|e| persistence(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| persistence(path, e))?;
    Ok(())
}

fn persistence(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Persistence(format!("failed to write {}: {}", path.display(), e))
}
