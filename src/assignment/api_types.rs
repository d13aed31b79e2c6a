//! Serde-deserializable types matching the assignment service's responses.
//!
//! Kept apart from the domain types so wire quirks stay out of the resolver.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::{AssignedVariant, AssignmentResponse, FeatureVariable};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiAssignmentResponse {
  pub flighting_version: i64,
  #[serde(default)]
  pub assignment_context: String,
  /// Flight name to variant name
  #[serde(default)]
  pub flights: Map<String, Value>,
  #[serde(default)]
  pub configs: Vec<ApiConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiConfig {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub parameters: Map<String, Value>,
}

impl From<ApiAssignmentResponse> for AssignmentResponse {
  fn from(api: ApiAssignmentResponse) -> Self {
    let assigned_variants = api
      .flights
      .into_iter()
      .map(|(flight, variant)| AssignedVariant {
        flight,
        variant: match variant {
          Value::String(s) => s,
          other => other.to_string(),
        },
      })
      .collect();

    let feature_variables = api
      .configs
      .into_iter()
      .flat_map(|config| config.parameters)
      .map(|(name, value)| FeatureVariable { name, value })
      .collect();

    AssignmentResponse {
      data_version: api.flighting_version,
      assigned_variants,
      feature_variables,
      assignment_context: api.assignment_context,
    }
  }
}
