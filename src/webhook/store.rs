//! Transactions file
//!
//! A JSON array rewritten in full on every append. Existing entries are kept
//! as raw JSON values so records written by earlier versions survive untouched.
//! Appends are serialized through an async mutex and written to a sibling
//! temporary file that is renamed over the original.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use super::event::TransactionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("transactions file {path} is not a JSON array: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to serialize transactions: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only store backed by one JSON file
pub struct TransactionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TransactionStore {
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records; a missing file reads as empty
    pub async fn load(&self) -> Result<Vec<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    /// Append one record and return the new record count
    pub async fn append(&self, record: TransactionRecord) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_all().await?;
        records.push(serde_json::to_value(&record)?);
        let content = serde_json::to_vec_pretty(&records)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, content).await.map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        Ok(records.len())
    }

    async fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        serde_json::from_slice(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
