//! In-memory sink for testing and dry runs.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::traits::sink::GymSink;
use crate::types::dataset::GymDataset;
use crate::types::facts::FactRecord;

/// Keeps every stored dataset, merged per gym name.
///
/// Mirrors the database contract: one id per gym name, and records whose
/// natural key is already stored for that gym are skipped.
#[derive(Default)]
pub struct MemorySink {
    gyms: RwLock<IndexMap<String, GymDataset>>,
    writes: RwLock<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored datasets in first-write order.
    pub fn datasets(&self) -> Vec<GymDataset> {
        self.gyms.read().unwrap().values().cloned().collect()
    }

    pub fn get(&self, gym: &str) -> Option<GymDataset> {
        self.gyms.read().unwrap().get(gym).cloned()
    }

    /// Number of `store` calls.
    pub fn write_count(&self) -> usize {
        *self.writes.read().unwrap()
    }
}

fn append_new<R: FactRecord>(stored: &mut Vec<R>, incoming: &[R]) {
    for record in incoming {
        let duplicate = record
            .natural_key()
            .is_some_and(|key| stored.iter().any(|s| s.natural_key().as_ref() == Some(&key)));
        if !duplicate {
            stored.push(record.clone());
        }
    }
}

#[async_trait]
impl GymSink for MemorySink {
    async fn store(&self, dataset: &GymDataset) -> Result<i64> {
        let mut gyms = self.gyms.write().unwrap();
        *self.writes.write().unwrap() += 1;

        let entry = gyms.entry(dataset.gym.clone());
        let index = entry.index();
        let stored = entry.or_insert_with(|| GymDataset::new(dataset.gym.clone()));

        append_new(&mut stored.locations, &dataset.locations);
        append_new(&mut stored.prices, &dataset.prices);
        append_new(&mut stored.schedules, &dataset.schedules);
        append_new(&mut stored.disciplines, &dataset.disciplines);

        Ok(index as i64 + 1)
    }
}
