//! Error taxonomy for experiment resolution.
//!
//! None of these escape [`crate::Experiments::enable_experiment`]; they exist so
//! the resolver can pick the right recovery path.

use std::path::PathBuf;

use thiserror::Error;

pub type ExperimentResult<T> = Result<T, ExperimentError>;

#[derive(Debug, Error)]
pub enum ExperimentError {
  /// Transport-level failure reaching the assignment service.
  #[error("network error: {0}")]
  Network(String),

  /// The cache file exists but is not a usable document.
  #[error("corrupt cache file {}: {message}", path.display())]
  CorruptCache { path: PathBuf, message: String },

  #[error("cache I/O error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not lock cache file {}: {message}", path.display())]
  Lock { path: PathBuf, message: String },

  /// Anything else, e.g. a response missing the fields we consult.
  #[error("unexpected error: {0}")]
  Unexpected(String),
}

impl ExperimentError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network(_))
  }
}
