//! Local cache of the experiment assignment.
//!
//! A single JSON document per installation that:
//! - Holds the per-install client id
//! - Remembers the last assignment together with its data version
//! - Only accepts strictly newer versions on merge
//! - Serves as the source of truth when the assignment service is unreachable

mod record;
mod storage;

pub use record::{CacheRecord, ALTERNATE};
pub use storage::{CacheFile, CacheLock};
