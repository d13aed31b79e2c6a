//! The persisted cache document.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Assignment value that enrolls an installation in the experiment.
pub const ALTERNATE: &str = "alternate";

/// One installation's cached identity and last known assignment.
///
/// Keys this crate doesn't know about are kept in `extra` and written back
/// unchanged, so newer writers can add fields without older ones dropping them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
  #[serde(rename = "clientid", default, skip_serializing_if = "Option::is_none")]
  pub client_id: Option<String>,

  #[serde(
    rename = "dataversion",
    default,
    deserialize_with = "deserialize_lenient_version",
    skip_serializing_if = "Option::is_none"
  )]
  pub data_version: Option<i64>,

  #[serde(
    rename = "variantassignment",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub variant_assignment: Option<String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl CacheRecord {
  /// A fresh record holding only the client id.
  pub fn with_client_id(client_id: impl Into<String>) -> Self {
    Self {
      client_id: Some(client_id.into()),
      ..Self::default()
    }
  }

  /// Apply a fetched assignment. Only a strictly newer version replaces what
  /// is cached; returns whether the record changed.
  pub fn merge(&mut self, new_version: i64, new_assignment: &str) -> bool {
    match self.data_version {
      Some(current) if current >= new_version => false,
      _ => {
        self.data_version = Some(new_version);
        self.variant_assignment = Some(new_assignment.to_string());
        true
      }
    }
  }

  pub fn is_alternate(&self) -> bool {
    self.variant_assignment.as_deref() == Some(ALTERNATE)
  }
}

/// Accepts the version as a JSON integer or as a string holding one.
fn deserialize_lenient_version<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => n
      .as_i64()
      .map(Some)
      .ok_or_else(|| D::Error::custom(format!("dataversion {} is not an integer", n))),
    Some(Value::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(Some)
      .map_err(|e| D::Error::custom(format!("dataversion {:?}: {}", s, e))),
    Some(other) => Err(D::Error::custom(format!(
      "dataversion has unsupported type: {}",
      other
    ))),
  }
}
