use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::validation::{is_safe_bucket_name, is_safe_file_name};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid storage name: {0}")]
    InvalidName(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Directory-per-bucket store under a single uploads root.
///
/// Objects are addressed by a storage key of the form `<bucket>/<filename>`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn storage_key(bucket: &str, filename: &str) -> String {
        format!("{}/{}", bucket, filename)
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_bucket_name(bucket) {
            return Err(StorageError::InvalidName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_file_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        Ok(self.bucket_dir(bucket)?.join(filename))
    }

    fn resolve_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        let (bucket, filename) = key
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidName(key.to_string()))?;
        self.object_path(bucket, filename)
    }

    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        fs::create_dir_all(self.bucket_dir(bucket)?).await?;
        tracing::debug!("Created bucket directory {}", bucket);
        Ok(())
    }

    pub async fn rename_bucket(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.bucket_dir(from)?;
        let target = self.bucket_dir(to)?;

        if fs::try_exists(&target).await? {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }

        match fs::rename(&source, &target).await {
            Ok(()) => {}
            // bucket had no directory yet; give it one under the new name
            Err(e) if e.kind() == ErrorKind::NotFound => fs::create_dir_all(&target).await?,
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Renamed bucket directory {} -> {}", from, to);
        Ok(())
    }

    pub async fn remove_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        match fs::remove_dir_all(self.bucket_dir(bucket)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a new object and returns its storage key. Fails with
    /// [`StorageError::AlreadyExists`] instead of touching bytes that are
    /// already on disk.
    pub async fn create(
        &self,
        bucket: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        self.write_with(bucket, filename, data, options).await
    }

    /// Writes (or overwrites) an object and returns its storage key.
    pub async fn write(
        &self,
        bucket: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        self.write_with(bucket, filename, data, options).await
    }

    async fn write_with(
        &self,
        bucket: &str,
        filename: &str,
        data: Bytes,
        options: fs::OpenOptions,
    ) -> Result<String, StorageError> {
        let path = self.object_path(bucket, filename)?;
        fs::create_dir_all(self.bucket_dir(bucket)?).await?;

        let key = Self::storage_key(bucket, filename);
        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(key)
    }

    pub async fn open(&self, key: &str) -> Result<fs::File, StorageError> {
        let path = self.resolve_key(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.resolve_key(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
