//! `switchbot-exporter` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing and process exit
//! codes. The core “business logic” lives in [`crate::router`] where it can
//! be tested deterministically with an injected scanner + injected output
//! streams; the metrics endpoint in [`crate::server`] reads the shared store
//! the router writes into.

pub mod mac_address;
pub mod meter;
pub mod output;
pub mod reading;
pub mod registry;
pub mod router;
pub mod scanner;
pub mod server;
pub mod store;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use mac_address::MacAddress;
pub use meter::{DecodeError, celsius_to_fahrenheit, decode_meter_data, dew_point};
pub use output::OutputFormatter;
pub use output::prometheus::PrometheusFormatter;
pub use reading::{SensorReading, TemperatureUnit};
pub use registry::{DeviceMapping, DeviceRegistry, parse_device};
pub use router::{METER_SIGNATURE, Options, RealScanner, RouteOutcome, route_scan_result};
pub use scanner::{AdvertisementEvent, AdvertisementKind, ScanError, ScanResult, parse_duration};
pub use store::ReadingStore;
