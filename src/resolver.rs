//! Resolves whether this installation is in the alternate experiment variant.
//!
//! One network attempt per call. A successful fetch is merged into the local
//! cache; when the service is unreachable the last cached assignment decides.
//! Every failure ends in a definite answer, and any doubt resolves to `false`.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::assignment::{
  AssignmentClient, AssignmentRequest, AssignmentResponse, CachedAssignmentClient,
  HttpAssignmentClient,
};
use crate::cache::{CacheFile, CacheRecord, ALTERNATE};
use crate::config::Config;
use crate::device::{DeviceAttributes, HostDeviceAttributes};
use crate::error::{ExperimentError, ExperimentResult};
use crate::identity::IdentityStore;
use crate::telemetry::{EventSink, NoopEventSink, TracingEventSink, VariantAssignmentEvent};

pub struct Experiments {
  cache: CacheFile,
  client: Arc<dyn AssignmentClient>,
  device: Arc<dyn DeviceAttributes>,
  events: Arc<dyn EventSink>,
}

impl Experiments {
  pub fn new(
    cache: CacheFile,
    client: Arc<dyn AssignmentClient>,
    device: Arc<dyn DeviceAttributes>,
    events: Arc<dyn EventSink>,
  ) -> Self {
    Self {
      cache,
      client,
      device,
      events,
    }
  }

  /// Wire up the HTTP client, host attributes and telemetry sink from config.
  pub fn from_config(config: &Config) -> Result<Self> {
    let http = HttpAssignmentClient::new(config.endpoint()?, config.timeout())?;
    let client = CachedAssignmentClient::new(http).with_stale_time(config.response_cache_time()?);

    let events: Arc<dyn EventSink> = if config.telemetry {
      Arc::new(TracingEventSink)
    } else {
      Arc::new(NoopEventSink)
    };

    Ok(Self::new(
      CacheFile::new(config.cache_path()?),
      Arc::new(client),
      Arc::new(HostDeviceAttributes::new(config.flight_ring.clone())),
      events,
    ))
  }

  pub fn cache(&self) -> &CacheFile {
    &self.cache
  }

  /// Whether this installation should get the alternate experience.
  pub async fn enable_experiment(&self) -> bool {
    let client_id = match IdentityStore::new(&self.cache).ensure_identity().await {
      Ok(id) => id,
      Err(e) => {
        error!(error = %e, "error creating or reading client identity");
        String::new()
      }
    };

    let request = self.build_request(client_id);

    match self.client.fetch(&request).await {
      Ok(response) => match self.apply_response(&request.client_id, response).await {
        Ok(enabled) => enabled,
        Err(e) => {
          error!(error = %e, "error getting variant assignments for experiment");
          false
        }
      },
      Err(e) if e.is_network() => {
        error!(error = %e, "error reaching assignment service, using cached assignment");
        self.cached_flag()
      }
      Err(e) => {
        error!(error = %e, "error getting variant assignments for experiment");
        false
      }
    }
  }

  fn build_request(&self, client_id: String) -> AssignmentRequest {
    let flight_ring = self.device.flight_ring().unwrap_or_default();
    AssignmentRequest {
      flight_ring,
      client_id,
    }
  }

  async fn apply_response(
    &self,
    client_id: &str,
    response: AssignmentResponse,
  ) -> ExperimentResult<bool> {
    if response.assigned_variants.is_empty() {
      debug!(data_version = response.data_version, "no variants assigned");
      return Ok(false);
    }

    let feature_flag_value = response
      .feature_variables
      .first()
      .ok_or_else(|| {
        ExperimentError::Unexpected("response has no feature variables".into())
      })?
      .string_value()
      .ok_or_else(|| {
        ExperimentError::Unexpected("first feature variable is not a string".into())
      })?
      .to_string();

    let enabled = feature_flag_value == ALTERNATE && !response.assignment_context.is_empty();

    let persisted = self
      .persist_assignment(client_id, response.data_version, &feature_flag_value)
      .await;
    match persisted {
      Ok(true) => info!(
        data_version = response.data_version,
        assignment = %feature_flag_value,
        "cached new variant assignment"
      ),
      Ok(false) => debug!(
        data_version = response.data_version,
        "cached assignment is current"
      ),
      Err(e) => warn!(error = %e, "failed to update cached assignment"),
    }

    let event = VariantAssignmentEvent {
      assignment_context: response.assignment_context,
      client_id: client_id.to_string(),
    };
    if let Err(e) = self.events.write_event(&event) {
      warn!(error = %e, "failed to write assignment telemetry");
    }

    Ok(enabled)
  }

  /// Merge a fetched assignment into the cache under the file lock.
  /// Returns whether the file was rewritten.
  async fn persist_assignment(
    &self,
    client_id: &str,
    data_version: i64,
    assignment: &str,
  ) -> ExperimentResult<bool> {
    let _lock = self.cache.lock().await?;

    let mut record = match self.cache.load()? {
      Some(record) => record,
      None if client_id.is_empty() => CacheRecord::default(),
      None => CacheRecord::with_client_id(client_id),
    };

    if !record.merge(data_version, assignment) {
      return Ok(false);
    }
    self.cache.save(&record)?;
    Ok(true)
  }

  /// Last known assignment, for when the service can't be reached.
  fn cached_flag(&self) -> bool {
    match self.cache.load() {
      Ok(Some(record)) => record.is_alternate(),
      Ok(None) => false,
      Err(e) => {
        warn!(error = %e, "cached assignment unavailable");
        false
      }
    }
  }
}
