use serde_json::Value;

/// Parameters sent to the assignment service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRequest {
  pub flight_ring: String,
  pub client_id: String,
}

impl AssignmentRequest {
  /// Wire parameters, in the order the service expects them.
  pub fn parameters(&self) -> [(&'static str, &str); 2] {
    [
      ("flightRing", self.flight_ring.as_str()),
      ("clientid", self.client_id.as_str()),
    ]
  }
}

/// A flight the client was placed in, with the variant it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedVariant {
  pub flight: String,
  pub variant: String,
}

/// A named configuration value carried by an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVariable {
  pub name: String,
  pub value: Value,
}

impl FeatureVariable {
  pub fn string_value(&self) -> Option<&str> {
    self.value.as_str()
  }
}

/// Versioned variant assignments returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentResponse {
  pub data_version: i64,
  pub assigned_variants: Vec<AssignedVariant>,
  pub feature_variables: Vec<FeatureVariable>,
  pub assignment_context: String,
}
