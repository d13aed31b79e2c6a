use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::CacheFile;

/// Environment variable that overrides the configured assignment endpoint.
pub const ENDPOINT_ENV: &str = "EXPGATE_ENDPOINT";

const DEFAULT_ENDPOINT: &str =
  concat!(
    "https://default.exp-tas.com/exptas77/",
    "a7a397e7-6fbe-4f21-a4e9-3f542e4b000e-exppowertoys/api/v1/tas"
  );

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub assignment: AssignmentConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Overrides the flight ring reported by the host
  pub flight_ring: Option<String>,
  /// Emit assignment telemetry events (default: true)
  #[serde(default = "default_telemetry")]
  pub telemetry: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      assignment: AssignmentConfig::default(),
      cache: CacheConfig::default(),
      flight_ring: None,
      telemetry: default_telemetry(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentConfig {
  #[serde(default = "default_endpoint")]
  pub endpoint: String,
  /// How long a fetched response may be reused within one process
  #[serde(default = "default_response_cache_secs")]
  pub response_cache_secs: u64,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for AssignmentConfig {
  fn default() -> Self {
    Self {
      endpoint: default_endpoint(),
      response_cache_secs: default_response_cache_secs(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_product")]
  pub vendor: String,
  #[serde(default = "default_product")]
  pub app: String,
  /// Explicit cache file location (defaults to the local data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      vendor: default_product(),
      app: default_product(),
      path: None,
    }
  }
}

fn default_endpoint() -> String {
  DEFAULT_ENDPOINT.to_string()
}

fn default_response_cache_secs() -> u64 {
  300
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_telemetry() -> bool {
  true
}

fn default_product() -> String {
  "expgate".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./expgate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/expgate/config.yaml
  ///
  /// Without any file the built-in defaults are used. `EXPGATE_ENDPOINT`
  /// overrides the endpoint from the file.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
      config.assignment.endpoint = endpoint;
    }
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("expgate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("expgate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty YAML document deserializes as null, not as an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  pub fn endpoint(&self) -> Result<Url> {
    let raw = &self.assignment.endpoint;
    Url::parse(raw).map_err(|e| eyre!("Invalid assignment endpoint {:?}: {}", raw, e))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.assignment.timeout_secs)
  }

  pub fn response_cache_time(&self) -> Result<chrono::Duration> {
    let secs = self.assignment.response_cache_secs;
    i64::try_from(secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .ok_or_else(|| eyre!("Invalid response_cache_secs {}: value is out of range", secs))
  }

  /// Where the cache file lives.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => CacheFile::default_path(&self.cache.vendor, &self.cache.app)
        .map_err(|e| eyre!("Failed to resolve cache location: {}", e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.assignment.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.assignment.response_cache_secs, 300);
    assert_eq!(config.cache.vendor, "expgate");
    assert!(config.flight_ring.is_none());
    assert!(config.telemetry);
    assert_eq!(config.response_cache_time().unwrap(), chrono::Duration::minutes(5));
  }

  #[test]
  fn test_telemetry_can_be_disabled() {
    let config = Config::parse("telemetry: false\n").unwrap();
    assert!(!config.telemetry);
  }

  #[test]
  fn test_out_of_range_response_cache_is_error() {
    let config = Config::parse("assignment:\n  response_cache_secs: 100000000000000000\n").unwrap();
    assert!(config.response_cache_time().is_err());

    let config = Config::parse(&format!("assignment:\n  response_cache_secs: {}\n", u64::MAX))
      .unwrap();
    assert!(config.response_cache_time().is_err());
  }

  #[test]
  fn test_partial_config() {
    let yaml = r#"
assignment:
  endpoint: http://localhost:8080/tas
  timeout_secs: 3
cache:
  path: /tmp/exp.json
flight_ring: Canary
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.assignment.endpoint, "http://localhost:8080/tas");
    assert_eq!(config.assignment.response_cache_secs, 300);
    assert_eq!(config.timeout(), Duration::from_secs(3));
    assert_eq!(config.cache_path().unwrap(), PathBuf::from("/tmp/exp.json"));
    assert_eq!(config.flight_ring.as_deref(), Some("Canary"));
  }

  #[test]
  fn test_cache_path_uses_vendor_and_app() {
    let yaml = "cache:\n  vendor: Acme\n  app: Widget\n";
    let config = Config::parse(yaml).unwrap();
    assert!(config
      .cache_path()
      .unwrap()
      .ends_with("Acme/Widget/experimentation.json"));
  }

  #[test]
  fn test_invalid_endpoint_is_error() {
    let config = Config::parse("assignment:\n  endpoint: not a url\n").unwrap();
    assert!(config.endpoint().is_err());
  }

  #[test]
  fn test_invalid_yaml_is_error() {
    assert!(Config::parse("assignment: [").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }
}
