//! Experiment assignment client.
//!
//! Decides whether this installation is enrolled in the "alternate" variant of
//! an experiment. The remote assignment service is asked once per resolution;
//! its answer is cached on disk so the decision survives network failure.

pub mod assignment;
pub mod cache;
pub mod config;
pub mod device;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod telemetry;

pub use error::{ExperimentError, ExperimentResult};
pub use resolver::Experiments;
