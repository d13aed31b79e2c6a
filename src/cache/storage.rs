//! JSON file storage for the cache record, plus the advisory lock that
//! serializes read-modify-write cycles across processes.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::record::CacheRecord;
use crate::error::{ExperimentError, ExperimentResult};

const CACHE_FILE_NAME: &str = "experimentation.json";
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(50);

/// The on-disk cache document.
#[derive(Debug, Clone)]
pub struct CacheFile {
  path: PathBuf,
  lock_timeout: Duration,
}

/// Exclusive lock on the cache file, released on drop.
#[derive(Debug)]
pub struct CacheLock {
  file: File,
}

impl Drop for CacheLock {
  fn drop(&mut self) {
    let _ = FileExt::unlock(&self.file);
  }
}

impl CacheFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock_timeout: LOCK_TIMEOUT,
    }
  }

  /// How long [`CacheFile::lock`] waits for another holder before giving up.
  pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
    self.lock_timeout = lock_timeout;
    self
  }

  /// `<local data dir>/<vendor>/<app>/experimentation.json`
  pub fn default_path(vendor: &str, app: &str) -> ExperimentResult<PathBuf> {
    let data_dir = dirs::data_local_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| {
        ExperimentError::Unexpected("could not determine data directory".into())
      })?;

    Ok(data_dir.join(vendor).join(app).join(CACHE_FILE_NAME))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  /// Read and parse the document. `Ok(None)` when there is no file yet.
  pub fn load(&self) -> ExperimentResult<Option<CacheRecord>> {
    let contents = match fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(ExperimentError::io(&self.path, e)),
    };

    serde_json::from_str(&contents)
      .map(Some)
      .map_err(|e| ExperimentError::CorruptCache {
        path: self.path.clone(),
        message: e.to_string(),
      })
  }

  /// Overwrite the file with the full document.
  ///
  /// The write is not atomic: a crash part-way through can leave a truncated
  /// file, which later loads report as `CorruptCache`.
  pub fn save(&self, record: &CacheRecord) -> ExperimentResult<()> {
    self.ensure_parent()?;

    let json = serde_json::to_string(record)
      .map_err(|e| ExperimentError::Unexpected(format!("failed to serialize cache: {}", e)))?;

    fs::write(&self.path, json).map_err(|e| ExperimentError::io(&self.path, e))?;
    debug!(path = %self.path.display(), "wrote cache file");
    Ok(())
  }

  /// Take the exclusive lock guarding this file.
  ///
  /// Contention is polled with a timer, so waiting doesn't tie up the runtime.
  pub async fn lock(&self) -> ExperimentResult<CacheLock> {
    self.ensure_parent()?;

    let lock_path = self.lock_path();
    let file = OpenOptions::new()
      .create(true)
      .truncate(false)
      .read(true)
      .write(true)
      .open(&lock_path)
      .map_err(|e| ExperimentError::io(&lock_path, e))?;

    let start = Instant::now();
    loop {
      match FileExt::try_lock_exclusive(&file) {
        Ok(()) => break,
        Err(err) if is_contended(&err) => {
          if start.elapsed() >= self.lock_timeout {
            return Err(ExperimentError::Lock {
              path: self.path.clone(),
              message: format!("timed out after {:?}: {}", self.lock_timeout, err),
            });
          }
          tokio::time::sleep(LOCK_RETRY).await;
        }
        Err(err) => {
          return Err(ExperimentError::Lock {
            path: self.path.clone(),
            message: err.to_string(),
          })
        }
      }
    }

    Ok(CacheLock { file })
  }

  fn lock_path(&self) -> PathBuf {
    let mut name = self
      .path
      .file_name()
      .map(|n| n.to_os_string())
      .unwrap_or_else(|| CACHE_FILE_NAME.into());
    name.push(".lock");
    self.path.with_file_name(name)
  }

  fn ensure_parent(&self) -> ExperimentResult<()> {
    if let Some(parent) = self.path.parent() {
      if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|e| ExperimentError::io(parent, e))?;
      }
    }
    Ok(())
  }
}

fn is_contended(err: &std::io::Error) -> bool {
  err.kind() == ErrorKind::WouldBlock
    || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
