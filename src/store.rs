//! Process-wide store of the most recent reading per location.
//!
//! The router task writes, the metrics endpoint reads. Updates replace whole
//! entries under the lock, so a reader either sees the previous reading or
//! the new one, never a mix.

use crate::reading::SensorReading;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Shared last-value-wins reading store, keyed by location label.
///
/// Cloning is cheap and yields another handle to the same map.
#[derive(Debug, Clone, Default)]
pub struct ReadingStore {
    inner: Arc<RwLock<BTreeMap<String, SensorReading>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any prior reading for `location`.
    pub fn update(&self, location: &str, reading: SensorReading) {
        self.inner
            .write()
            .expect("reading store lock poisoned")
            .insert(location.to_string(), reading);
    }

    /// Detached copy of the current contents, for rendering.
    ///
    /// Sorted by location so rendered output is stable between scrapes.
    pub fn snapshot(&self) -> BTreeMap<String, SensorReading> {
        self.inner
            .read()
            .expect("reading store lock poisoned")
            .clone()
    }
}
