//! Output formatters for store snapshots.
//!
//! This module provides a trait for rendering the latest readings and an
//! implementation for the Prometheus text exposition format. The trait keeps
//! the metrics endpoint independent of the wire format.

pub mod prometheus;

use crate::reading::SensorReading;
use std::collections::BTreeMap;

/// Trait for rendering a snapshot of the latest readings into a text body.
pub trait OutputFormatter: Send + Sync {
    /// Render all readings, keyed by location label.
    ///
    /// An empty snapshot must render to an empty (but still valid) body.
    fn format(&self, snapshot: &BTreeMap<String, SensorReading>) -> String;
}
