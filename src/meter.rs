//! SwitchBot meter payload decoding.
//!
//! The meter packs its state into the last six bytes of the manufacturer-data
//! AD structure of a connectable undirected advertisement. This module turns
//! that tail into engineering units and derives the dew point.

use crate::reading::{SensorReading, TemperatureUnit};
use thiserror::Error;

/// Number of payload bytes the meter decoder consumes.
pub const METER_DATA_LEN: usize = 6;

/// Error types for decoding meter data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload shorter than the fixed meter tail; the router is expected to
    /// never pass one.
    #[error("invalid payload: need at least {METER_DATA_LEN} bytes, got {0}")]
    InvalidPayload(usize),
    /// Dew point came out non-finite (humidity of 0 drives the Magnus
    /// logarithm to infinity).
    #[error("non-finite dew point at humidity {humidity}%")]
    NonFiniteDewPoint { humidity: u8 },
}

/// Convert a temperature from Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Estimate the dew point via the Magnus approximation.
///
/// `temperature` is taken in whatever unit the meter is configured to, and
/// the result comes back in that same unit, rounded to one decimal.
///
/// Note: the constant pair is selected on the sign of the temperature in its
/// current unit, while the formula output is always treated as a Celsius
/// value and converted afterwards. This mirrors the device's reference
/// behavior even though it is not unit-consistent; do not "fix" it here
/// without reconciling against recorded device output.
///
/// A humidity of 0 produces a non-finite result (NaN); callers decide how to
/// surface that.
pub fn dew_point(temperature: f64, humidity: u8, unit: TemperatureUnit) -> f64 {
    let a = 6.1121; // millibars
    let (b, c) = if temperature >= 0.0 {
        (17.368, 238.88)
    } else {
        (17.966, 247.15)
    };

    // Saturated and actual water vapor pressure, in millibars.
    let ps = a * (b * temperature / (c + temperature)).exp();
    let pa = f64::from(humidity) / 100.0 * ps;

    let dp = c * (pa / a).ln() / (b - (pa / a).ln());
    match unit {
        TemperatureUnit::Celsius => round1(dp),
        TemperatureUnit::Fahrenheit => round1(celsius_to_fahrenheit(dp)),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Decode the 6-byte meter tail into a [`SensorReading`].
///
/// Bit layout of the tail:
/// - `data[2] & 0x7F` battery percent
/// - `data[3] & 0x0F` temperature fraction in decidegrees
/// - `data[4] & 0x7F` temperature integer magnitude
/// - `data[4] & 0x80` sign flag, set means non-negative
/// - `data[5] & 0x7F` relative humidity percent
/// - `data[5] & 0x80` display unit flag, set means Fahrenheit
///
/// Fahrenheit conversion happens after sign resolution, and the dew point is
/// derived from the unit-adjusted temperature.
pub fn decode_meter_data(data: &[u8], rssi: i16) -> Result<SensorReading, DecodeError> {
    if data.len() < METER_DATA_LEN {
        return Err(DecodeError::InvalidPayload(data.len()));
    }

    let mut temperature = f64::from(data[4] & 0x7F) + f64::from(data[3] & 0x0F) / 10.0;
    if data[4] & 0x80 == 0 {
        temperature = -temperature;
    }

    let unit = if data[5] & 0x80 != 0 {
        TemperatureUnit::Fahrenheit
    } else {
        TemperatureUnit::Celsius
    };
    let humidity = data[5] & 0x7F;
    let battery = data[2] & 0x7F;

    if unit == TemperatureUnit::Fahrenheit {
        temperature = celsius_to_fahrenheit(temperature);
    }

    let dew_point = dew_point(temperature, humidity, unit);
    if !dew_point.is_finite() {
        return Err(DecodeError::NonFiniteDewPoint { humidity });
    }

    Ok(SensorReading {
        temperature,
        unit,
        humidity,
        dew_point,
        battery,
        rssi,
    })
}
