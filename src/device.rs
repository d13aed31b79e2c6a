//! Host platform attributes used to target assignments.

/// Environment variable consulted for the flight ring when no override is configured.
pub const FLIGHT_RING_ENV: &str = "EXPGATE_FLIGHT_RING";

/// Synchronous lookup of device attributes.
///
/// Called on the resolution path without yielding, so implementations should
/// answer quickly.
pub trait DeviceAttributes: Send + Sync {
  /// The device's release channel, if the platform reports one.
  fn flight_ring(&self) -> Option<String>;
}

/// Reads the flight ring from a fixed override, then from the environment.
#[derive(Debug, Clone, Default)]
pub struct HostDeviceAttributes {
  flight_ring_override: Option<String>,
}

impl HostDeviceAttributes {
  pub fn new(flight_ring_override: Option<String>) -> Self {
    Self {
      flight_ring_override,
    }
  }
}

impl DeviceAttributes for HostDeviceAttributes {
  fn flight_ring(&self) -> Option<String> {
    self
      .flight_ring_override
      .clone()
      .or_else(|| std::env::var(FLIGHT_RING_ENV).ok())
      .filter(|ring| !ring.is_empty())
  }
}

/// Fixed answers, for callers that already know the device's attributes.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceAttributes {
  pub flight_ring: Option<String>,
}

impl DeviceAttributes for StaticDeviceAttributes {
  fn flight_ring(&self) -> Option<String> {
    self.flight_ring.clone()
  }
}
