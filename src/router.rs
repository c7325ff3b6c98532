//! Advertisement router (core pipeline) for `switchbot-exporter`.
//!
//! Consumes raw scan events, classifies the sender, gates on the meter
//! advertisement signature, and writes decoded readings into the shared
//! store. Decoupled from CLI parsing and process exit codes so it can be
//! tested deterministically with an injected scanner and in-memory writers.

use crate::meter::{DecodeError, METER_DATA_LEN, decode_meter_data};
use crate::reading::SensorReading;
use crate::registry::{DeviceMapping, DeviceRegistry};
use crate::scanner::{AdvertisementEvent, AdvertisementKind, ScanError, ScanResult};
use crate::store::ReadingStore;
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// First 7 payload bytes of a SwitchBot-type meter advertisement: flags AD
/// structure (02 01 06) followed by a manufacturer-data AD structure header
/// (0E FF) and the vendor company identifier (69 09, little-endian).
pub const METER_SIGNATURE: [u8; 7] = [0x02, 0x01, 0x06, 0x0E, 0xFF, 0x69, 0x09];

/// Configuration for the exporter.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Map a meter's hardware address to a location label.
    /// Format: --device C1:E7:23:0D:7F:3C=Office
    #[arg(long = "device", value_parser = crate::registry::parse_device, value_name = "DEVICE")]
    pub devices: Vec<DeviceMapping>,

    /// Address the metrics endpoint listens on
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Prefix for exported metric names
    #[arg(long, default_value = "switchbot")]
    pub metric_prefix: String,

    /// Stop scanning after this long (e.g. 60s, 5m).
    /// Without it the scan runs until interrupted; the metrics endpoint
    /// keeps serving the last readings either way.
    #[arg(long, value_parser = crate::scanner::parse_duration)]
    pub scan_duration: Option<Duration>,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        scan_duration: Option<Duration>,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<AdvertisementEvent>, ScanError>> + Send + '_>,
    >;
}

/// Real scanner implementation that delegates to the compiled-in radio backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        scan_duration: Option<Duration>,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<AdvertisementEvent>, ScanError>> + Send + '_>,
    > {
        Box::pin(async move { crate::scanner::start_scan(scan_duration).await })
    }
}

/// What handling one scan result produced.
#[derive(Debug, PartialEq)]
pub enum RouteOutcome {
    /// Reading decoded and written into the store under this location.
    Stored(String, SensorReading),
    /// Payload passed the gate but failed to decode; store untouched.
    DecodeFailed(String, DecodeError),
    /// Unknown address, wrong kind, or wrong signature; not an error.
    Ignored,
}

/// Apply the routing rules to a single scan result.
///
/// Auto-registration runs first so a meter's own scan response can admit the
/// advertisement that follows it. Decoding only happens for a resolved
/// address, a connectable undirected advertisement, and an exact signature
/// match; everything else is silently ignored.
pub fn route_scan_result(
    registry: &mut DeviceRegistry,
    store: &ReadingStore,
    result: &ScanResult,
) -> RouteOutcome {
    if result.kind == AdvertisementKind::ScanResponse && result.payload.len() >= 5 {
        registry.auto_register_if_unknown(result.address, &result.payload);
    }

    let Some(location) = registry.resolve(result.address) else {
        return RouteOutcome::Ignored;
    };

    if result.kind != AdvertisementKind::AdvInd
        || result.payload.get(..METER_SIGNATURE.len()) != Some(&METER_SIGNATURE[..])
    {
        return RouteOutcome::Ignored;
    }

    // Signature match guarantees the payload is long enough for the tail.
    let tail = &result.payload[result.payload.len() - METER_DATA_LEN..];
    match decode_meter_data(tail, result.rssi) {
        Ok(reading) => {
            let location = location.to_string();
            store.update(&location, reading.clone());
            RouteOutcome::Stored(location, reading)
        }
        Err(e) => RouteOutcome::DecodeFailed(location.to_string(), e),
    }
}

/// Run the core processing loop until the scan session ends.
///
/// - Decoded readings are written into `store` and logged to `out` as
///   `<location> <reading>` lines.
/// - Decode failures are logged to `err` and leave the store untouched.
/// - Filtered-out advertisements produce no output at all.
/// - A `ScanComplete` event logs a completion notice and ends the loop.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    store: &ReadingStore,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let mut registry = DeviceRegistry::new(&options.devices);

    let mut events = scanner.start_scan(options.scan_duration).await?;

    while let Some(event) = events.recv().await {
        match event {
            AdvertisementEvent::ScanResult(result) => {
                match route_scan_result(&mut registry, store, &result) {
                    RouteOutcome::Stored(location, reading) => {
                        writeln!(out, "{location} {reading}")?;
                    }
                    RouteOutcome::DecodeFailed(location, decode_err) => {
                        writeln!(err, "{location}: {decode_err}")?;
                    }
                    RouteOutcome::Ignored => {}
                }
            }
            AdvertisementEvent::ScanComplete => {
                writeln!(out, "scan complete")?;
                break;
            }
        }
    }

    Ok(())
}
