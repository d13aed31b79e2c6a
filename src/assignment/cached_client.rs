//! Assignment client that wraps another client with a short-lived response cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::client::AssignmentClient;
use super::types::{AssignmentRequest, AssignmentResponse};
use crate::error::ExperimentResult;

struct CachedResponse {
  response: AssignmentResponse,
  cached_at: DateTime<Utc>,
}

/// Serves repeated identical requests from memory while the last response is fresh.
///
/// Errors are never cached, so a failed fetch is retried on the next call.
pub struct CachedAssignmentClient<C: AssignmentClient> {
  inner: C,
  responses: Mutex<HashMap<String, CachedResponse>>,
  /// How long before a cached response is considered stale
  stale_time: Duration,
}

impl<C: AssignmentClient> CachedAssignmentClient<C> {
  pub fn new(inner: C) -> Self {
    Self {
      inner,
      responses: Mutex::new(HashMap::new()),
      stale_time: Duration::minutes(5),
    }
  }

  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }
}

/// Stable, fixed-length key for a request's parameters.
fn cache_key(request: &AssignmentRequest) -> String {
  let mut hasher = Sha256::new();
  for (name, value) in request.parameters() {
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(value.as_bytes());
    hasher.update([0u8]);
  }
  hex::encode(hasher.finalize())
}

#[async_trait]
impl<C: AssignmentClient> AssignmentClient for CachedAssignmentClient<C> {
  async fn fetch(&self, request: &AssignmentRequest) -> ExperimentResult<AssignmentResponse> {
    let key = cache_key(request);

    if let Some(cached) = self.responses.lock().await.get(&key) {
      if !self.is_stale(cached.cached_at) {
        debug!("serving assignment response from memory");
        return Ok(cached.response.clone());
      }
    }

    let response = self.inner.fetch(request).await?;

    let mut responses = self.responses.lock().await;
    responses.retain(|_, cached| !self.is_stale(cached.cached_at));
    responses.insert(
      key,
      CachedResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(response)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ExperimentError;
  use std::sync::atomic::{AtomicU32, Ordering};

  struct CountingClient {
    calls: AtomicU32,
    fail: bool,
  }

  #[async_trait]
  impl AssignmentClient for CountingClient {
    async fn fetch(&self, _request: &AssignmentRequest) -> ExperimentResult<AssignmentResponse> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(ExperimentError::Network("down".into()));
      }
      Ok(AssignmentResponse {
        data_version: i64::from(n),
        assigned_variants: Vec::new(),
        feature_variables: Vec::new(),
        assignment_context: String::new(),
      })
    }
  }

  fn counting(fail: bool) -> CountingClient {
    CountingClient {
      calls: AtomicU32::new(0),
      fail,
    }
  }

  fn request(client_id: &str) -> AssignmentRequest {
    AssignmentRequest {
      flight_ring: String::new(),
      client_id: client_id.to_string(),
    }
  }

  #[tokio::test]
  async fn test_fresh_response_is_reused() {
    let client = CachedAssignmentClient::new(counting(false));

    let first = client.fetch(&request("a")).await.unwrap();
    let second = client.fetch(&request("a")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_different_requests_are_cached_separately() {
    let client = CachedAssignmentClient::new(counting(false));

    client.fetch(&request("a")).await.unwrap();
    client.fetch(&request("b")).await.unwrap();
    assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_stale_response_is_refetched() {
    let client =
      CachedAssignmentClient::new(counting(false)).with_stale_time(Duration::milliseconds(-1));

    client.fetch(&request("a")).await.unwrap();
    let second = client.fetch(&request("a")).await.unwrap();
    assert_eq!(second.data_version, 1);
  }

  #[tokio::test]
  async fn test_stale_entries_are_evicted() {
    let client =
      CachedAssignmentClient::new(counting(false)).with_stale_time(Duration::milliseconds(-1));

    for id in ["a", "b", "c"] {
      client.fetch(&request(id)).await.unwrap();
    }
    assert_eq!(client.responses.lock().await.len(), 1);
  }

  #[tokio::test]
  async fn test_fresh_entries_are_kept() {
    let client = CachedAssignmentClient::new(counting(false));

    for id in ["a", "b", "c"] {
      client.fetch(&request(id)).await.unwrap();
    }
    assert_eq!(client.responses.lock().await.len(), 3);
  }

  #[tokio::test]
  async fn test_errors_are_not_cached() {
    let client = CachedAssignmentClient::new(counting(true));

    assert!(client.fetch(&request("a")).await.is_err());
    assert!(client.fetch(&request("a")).await.is_err());
    assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
  }
}
