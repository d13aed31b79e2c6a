use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::ApiAssignmentResponse;
use super::types::{AssignmentRequest, AssignmentResponse};
use crate::error::{ExperimentError, ExperimentResult};

const USER_AGENT_VALUE: &str = concat!("expgate/", env!("CARGO_PKG_VERSION"));

/// Source of variant assignments.
///
/// Implementations make exactly one attempt per call. Failures to reach the
/// service must be reported as [`ExperimentError::Network`]; a reply that
/// can't be understood is [`ExperimentError::Unexpected`].
#[async_trait]
pub trait AssignmentClient: Send + Sync {
  async fn fetch(&self, request: &AssignmentRequest) -> ExperimentResult<AssignmentResponse>;
}

/// Assignment client for a TAS-style HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpAssignmentClient {
  client: reqwest::Client,
  endpoint: Url,
}

impl HttpAssignmentClient {
  pub fn new(endpoint: Url, timeout: Duration) -> ExperimentResult<Self> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .default_headers(default_headers)
      .build()
      .map_err(|e| ExperimentError::Unexpected(format!("failed to create HTTP client: {}", e)))?;

    Ok(Self { client, endpoint })
  }
}

#[async_trait]
impl AssignmentClient for HttpAssignmentClient {
  async fn fetch(&self, request: &AssignmentRequest) -> ExperimentResult<AssignmentResponse> {
    debug!(
      endpoint = %self.endpoint,
      flight_ring = %request.flight_ring,
      "fetching variant assignments"
    );

    let response = self
      .client
      .get(self.endpoint.clone())
      .query(&request.parameters())
      .send()
      .await
      .map_err(|e| {
        ExperimentError::Network(format!("request to assignment service failed: {}", e))
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(ExperimentError::Network(format!(
        "assignment service returned {}",
        status
      )));
    }

    let body = response
      .text()
      .await
      .map_err(|e| ExperimentError::Network(format!("failed to read assignment response: {}", e)))?;

    let api: ApiAssignmentResponse = serde_json::from_str(&body).map_err(|e| {
      ExperimentError::Unexpected(format!("failed to parse assignment response: {}", e))
    })?;

    Ok(api.into())
  }
}
