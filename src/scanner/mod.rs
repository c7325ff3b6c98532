//! BLE scanner boundary for the advertisement pipeline.
//!
//! The radio backend delivers [`AdvertisementEvent`] values over a channel in
//! chronological order; the router consumes them one at a time. Only the raw
//! HCI backend is provided: it is the only path that exposes the PDU kind and
//! the undecoded AD payload the routing rules are written against.

#[cfg(feature = "hci")]
pub mod hci;

use crate::mac_address::MacAddress;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// No radio backend compiled in
    #[allow(dead_code)]
    #[error("no scanner backend compiled in (enable the 'hci' feature)")]
    NoBackend,
}

/// Channel buffer size for advertisement events.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// BLE advertisement PDU kinds, as reported in LE Advertising Report events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementKind {
    /// Connectable undirected advertisement (ADV_IND)
    AdvInd,
    /// Connectable directed advertisement (ADV_DIRECT_IND)
    AdvDirectInd,
    /// Scannable undirected advertisement (ADV_SCAN_IND)
    AdvScanInd,
    /// Non-connectable undirected advertisement (ADV_NONCONN_IND)
    AdvNonconnInd,
    /// Response to an active scanner's request (SCAN_RSP)
    ScanResponse,
}

impl AdvertisementKind {
    /// Map the wire event type to a kind; unknown values are dropped by the
    /// backend before they reach the router.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::AdvInd),
            0x01 => Some(Self::AdvDirectInd),
            0x02 => Some(Self::AdvScanInd),
            0x03 => Some(Self::AdvNonconnInd),
            0x04 => Some(Self::ScanResponse),
            _ => None,
        }
    }
}

/// A single advertising report as seen by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub address: MacAddress,
    pub address_type: u8,
    pub kind: AdvertisementKind,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Raw AD payload, undecoded
    pub payload: Vec<u8>,
}

/// Event delivered from the radio backend to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisementEvent {
    ScanResult(ScanResult),
    /// The configured scan duration elapsed; terminal for the session.
    ScanComplete,
}

/// Start scanning for advertisements.
///
/// With a `scan_duration`, the backend disables scanning once it elapses and
/// delivers a final [`AdvertisementEvent::ScanComplete`]; without one, the
/// scan runs until the process is interrupted.
pub async fn start_scan(
    scan_duration: Option<Duration>,
) -> Result<mpsc::Receiver<AdvertisementEvent>, ScanError> {
    #[cfg(feature = "hci")]
    {
        hci::start_scan(scan_duration).await
    }
    #[cfg(not(feature = "hci"))]
    {
        let _ = scan_duration;
        Err(ScanError::NoBackend)
    }
}

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Examples
/// ```
/// use switchbot_exporter::scanner::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    if let Some(num) = src.strip_suffix("ms") {
        let millis: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid milliseconds: {}", num))?;
        return Ok(Duration::from_millis(millis));
    }

    if let Some(num) = src.strip_suffix('h') {
        let hours: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid hours: {}", num))?;
        return Ok(Duration::from_secs(hours * 3600));
    }

    if let Some(num) = src.strip_suffix('m') {
        let minutes: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid minutes: {}", num))?;
        return Ok(Duration::from_secs(minutes * 60));
    }

    if let Some(num) = src.strip_suffix('s') {
        let secs: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid seconds: {}", num))?;
        return Ok(Duration::from_secs(secs));
    }

    // No suffix, treat as seconds
    let secs: u64 = src
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;
    Ok(Duration::from_secs(secs))
}
