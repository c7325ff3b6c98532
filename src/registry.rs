//! Device registry mapping hardware addresses to location labels.
//!
//! Entries come from two places: operator-supplied `--device` mappings parsed
//! at startup, and auto-discovered meters registered when their scan response
//! carries the vendor marker. The registry only ever grows during a session
//! and is rebuilt from the CLI seed on every restart.

use crate::mac_address::MacAddress;
use std::collections::HashMap;

/// Value of the scan-response byte identifying a SwitchBot-type meter.
pub const VENDOR_MARKER: u8 = 0x54;

/// Offset of the vendor marker within the scan-response payload.
pub const VENDOR_MARKER_OFFSET: usize = 4;

/// A parsed CLI mapping from a hardware address to a location label.
#[derive(Debug, Clone)]
pub struct DeviceMapping {
    pub address: MacAddress,
    pub location: String,
}

/// Parse a device mapping from a string in the format "MAC=Location".
///
/// # Example
/// ```
/// use switchbot_exporter::registry::parse_device;
///
/// let mapping = parse_device("C1:E7:23:0D:7F:3C=Office").unwrap();
/// assert_eq!(mapping.location, "Office");
/// ```
pub fn parse_device(src: &str) -> Result<DeviceMapping, String> {
    let (address, location) = src
        .split_once('=')
        .ok_or_else(|| "invalid device mapping: expected format MAC=Location".to_string())?;
    let address = address.parse().map_err(|e| format!("{e}"))?;
    Ok(DeviceMapping {
        address,
        location: location.to_string(),
    })
}

/// Registry of known meters.
///
/// Owned by the router task; the single-writer discipline means no locking is
/// needed here even though labels are read on every scan result.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<MacAddress, String>,
}

impl DeviceRegistry {
    /// Build a registry from pre-provisioned mappings.
    pub fn new(seed: &[DeviceMapping]) -> Self {
        Self {
            devices: seed
                .iter()
                .map(|m| (m.address, m.location.clone()))
                .collect(),
        }
    }

    /// Look up the location label for an address.
    pub fn resolve(&self, address: MacAddress) -> Option<&str> {
        self.devices.get(&address).map(String::as_str)
    }

    /// Register an unknown meter sighted via its scan response.
    ///
    /// Inserts `unnamed_<address>` when the address is absent, the payload is
    /// long enough to carry the vendor marker, and the marker matches.
    /// Re-registering a known address is a no-op; existing labels are never
    /// overwritten, whether pre-provisioned or auto-discovered.
    pub fn auto_register_if_unknown(&mut self, address: MacAddress, scan_response: &[u8]) {
        if self.devices.contains_key(&address) {
            return;
        }
        if scan_response.len() <= VENDOR_MARKER_OFFSET {
            return;
        }
        if scan_response[VENDOR_MARKER_OFFSET] != VENDOR_MARKER {
            return;
        }
        self.devices.insert(address, format!("unnamed_{address}"));
    }

    /// Number of known devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
