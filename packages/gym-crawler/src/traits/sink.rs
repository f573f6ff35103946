//! Storage sink for merged gym datasets.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::dataset::GymDataset;

/// Persists one merged dataset per gym.
///
/// Contract: the gym id is get-or-create by name; the four record arrays are
/// inserted scoped to that id; records whose natural key already exists are
/// silently skipped; the whole write commits or rolls back as one unit.
#[async_trait]
pub trait GymSink: Send + Sync {
    /// Store a dataset and return the gym id.
    async fn store(&self, dataset: &GymDataset) -> Result<i64>;
}
