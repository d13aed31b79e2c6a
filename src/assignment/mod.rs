//! Access to the remote variant assignment service.

mod api_types;
mod cached_client;
mod client;
mod types;

pub use cached_client::CachedAssignmentClient;
pub use client::{AssignmentClient, HttpAssignmentClient};
pub use types::{AssignedVariant, AssignmentRequest, AssignmentResponse, FeatureVariable};
