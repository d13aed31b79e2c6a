//! Per-install client identity, stored in the cache file.

use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheFile, CacheRecord};
use crate::error::{ExperimentError, ExperimentResult};

pub struct IdentityStore<'a> {
  cache: &'a CacheFile,
}

impl<'a> IdentityStore<'a> {
  pub fn new(cache: &'a CacheFile) -> Self {
    Self { cache }
  }

  /// Return the installation's client id, creating the cache file with a new
  /// random id if there is none yet.
  ///
  /// Reading an existing file takes no lock; only creation does, and it checks
  /// again once the lock is held in case another process got there first.
  pub async fn ensure_identity(&self) -> ExperimentResult<String> {
    if let Some(record) = self.cache.load()? {
      return self.client_id_of(record);
    }

    let _lock = self.cache.lock().await?;

    match self.cache.load()? {
      Some(record) => self.client_id_of(record),
      None => {
        let client_id = Uuid::new_v4().to_string();
        self.cache.save(&CacheRecord::with_client_id(&client_id))?;
        info!(path = %self.cache.path().display(), "created new client identity");
        Ok(client_id)
      }
    }
  }

  fn client_id_of(&self, record: CacheRecord) -> ExperimentResult<String> {
    record.client_id.ok_or_else(|| ExperimentError::CorruptCache {
      path: self.cache.path().to_path_buf(),
      message: "missing clientid".to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_ensure_identity_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache = CacheFile::new(dir.path().join("experimentation.json"));
    let store = IdentityStore::new(&cache);

    let first = store.ensure_identity().await.unwrap();
    let second = store.ensure_identity().await.unwrap();
    assert_eq!(first, second);
    assert!(Uuid::parse_str(&first).is_ok());
  }

  #[tokio::test]
  async fn test_new_cache_holds_only_client_id() {
    let dir = TempDir::new().unwrap();
    let cache = CacheFile::new(dir.path().join("experimentation.json"));
    let id = IdentityStore::new(&cache).ensure_identity().await.unwrap();

    let contents = std::fs::read_to_string(cache.path()).unwrap();
    assert_eq!(contents, format!(r#"{{"clientid":"{}"}}"#, id));
  }

  #[tokio::test]
  async fn test_existing_client_id_is_returned() {
    let dir = TempDir::new().unwrap();
    let cache = CacheFile::new(dir.path().join("experimentation.json"));
    std::fs::write(
      cache.path(),
      r#"{"clientid":"fixed-id","dataversion":2,"variantassignment":"control"}"#,
    )
    .unwrap();

    let id = IdentityStore::new(&cache).ensure_identity().await.unwrap();
    assert_eq!(id, "fixed-id");
  }

  #[tokio::test]
  async fn test_missing_client_id_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let cache = CacheFile::new(dir.path().join("experimentation.json"));
    std::fs::write(cache.path(), r#"{"dataversion":2}"#).unwrap();

    let result = IdentityStore::new(&cache).ensure_identity().await;
    assert!(matches!(result, Err(ExperimentError::CorruptCache { .. })));
  }

  #[tokio::test]
  async fn test_unparsable_cache_is_corrupt_and_untouched() {
    let dir = TempDir::new().unwrap();
    let cache = CacheFile::new(dir.path().join("experimentation.json"));
    std::fs::write(cache.path(), "garbage").unwrap();

    let result = IdentityStore::new(&cache).ensure_identity().await;
    assert!(matches!(result, Err(ExperimentError::CorruptCache { .. })));
    assert_eq!(std::fs::read_to_string(cache.path()).unwrap(), "garbage");
  }

  #[tokio::test]
  async fn test_existing_id_is_read_while_lock_is_held() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("experimentation.json");
    std::fs::write(&path, r#"{"clientid":"fixed-id"}"#).unwrap();

    let holder = CacheFile::new(&path);
    let _held = holder.lock().await.unwrap();

    let reader = CacheFile::new(&path).with_lock_timeout(Duration::from_millis(100));
    let id = IdentityStore::new(&reader).ensure_identity().await.unwrap();
    assert_eq!(id, "fixed-id");
  }

  #[tokio::test]
  async fn test_concurrent_creation_agrees_on_one_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("experimentation.json");
    let first_cache = CacheFile::new(&path);
    let second_cache = CacheFile::new(&path);
    let first = IdentityStore::new(&first_cache);
    let second = IdentityStore::new(&second_cache);

    let (a, b) = tokio::join!(first.ensure_identity(), second.ensure_identity());
    assert_eq!(a.unwrap(), b.unwrap());
  }
}
