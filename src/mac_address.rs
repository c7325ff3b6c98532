//! Hardware address type for BLE devices.
//!
//! A meter is identified by the 6-byte address it advertises from. The
//! canonical rendering (12 uppercase hex characters, colon-grouped) is used
//! both as the auto-registration label suffix and in CLI device mappings, so
//! it must be deterministic regardless of locale or input case.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// A 6-byte BLE hardware address.
///
/// Stored as a plain array so it is cheap to copy and usable as a map key
/// without tying the core to any Bluetooth library type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Errors returned when parsing a hardware address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid address: expected 6 colon-separated octets, got {0}")]
    InvalidLength(usize),
    #[error("invalid address: octet {0} is not two characters")]
    InvalidOctetLength(usize),
    #[error("invalid address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError::InvalidLength(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidOctetLength(i));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::InvalidHex(part.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uppercase_colon_grouped() {
        let addr = MacAddress([0xC1, 0xE7, 0x23, 0x0D, 0x7F, 0x3C]);
        assert_eq!(format!("{}", addr), "C1:E7:23:0D:7F:3C");
    }

    #[test]
    fn test_display_pads_zeros() {
        let addr = MacAddress([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(format!("{}", addr), "00:01:02:03:04:05");
    }

    #[test]
    fn test_from_str_round_trip() {
        let addr: MacAddress = "C1:E7:23:0D:7F:3C".parse().unwrap();
        assert_eq!(addr.0, [0xC1, 0xE7, 0x23, 0x0D, 0x7F, 0x3C]);
        assert_eq!(addr.to_string(), "C1:E7:23:0D:7F:3C");
    }

    #[test]
    fn test_from_str_accepts_lowercase() {
        let addr: MacAddress = "c1:e7:23:0d:7f:3c".parse().unwrap();
        assert_eq!(addr.to_string(), "C1:E7:23:0D:7F:3C");
    }

    #[test]
    fn test_from_str_invalid() {
        assert!(matches!(
            "garbage".parse::<MacAddress>(),
            Err(ParseMacError::InvalidLength(1))
        ));
        assert!(matches!(
            "C1:E7:23".parse::<MacAddress>(),
            Err(ParseMacError::InvalidLength(3))
        ));
        assert!(matches!(
            "C1:E7:23:0D:7F:3".parse::<MacAddress>(),
            Err(ParseMacError::InvalidOctetLength(5))
        ));
        assert!(matches!(
            "C1:E7:23:0D:7F:ZZ".parse::<MacAddress>(),
            Err(ParseMacError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(MacAddress([0xC1, 0xE7, 0x23, 0x0D, 0x7F, 0x3C]), "Office");
        assert_eq!(
            map.get(&"C1:E7:23:0D:7F:3C".parse::<MacAddress>().unwrap()),
            Some(&"Office")
        );
    }
}
