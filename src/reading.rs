//! Decoded sensor reading data structure.

use std::fmt;

/// Display unit configured on the meter itself.
///
/// The unit applies to both the temperature and the derived dew point; the
/// two always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "C"),
            TemperatureUnit::Fahrenheit => write!(f, "F"),
        }
    }
}

/// One decoded advertisement from a SwitchBot meter.
///
/// Constructed fresh per advertisement and never mutated afterwards; the
/// latest-reading store replaces whole values, so readers never observe a
/// partially updated reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Temperature in the unit configured on the device
    pub temperature: f64,
    /// Unit of `temperature` and `dew_point`
    pub unit: TemperatureUnit,
    /// Relative humidity in percent
    pub humidity: u8,
    /// Dew point in the same unit as `temperature`, rounded to one decimal
    pub dew_point: f64,
    /// Battery level in percent
    pub battery: u8,
    /// Received signal strength in dBm
    pub rssi: i16,
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temperature={}{} humidity={}% dew_point={}{} battery={}% rssi={}dBm",
            self.temperature, self.unit, self.humidity, self.dew_point, self.unit, self.battery, self.rssi
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_display() {
        assert_eq!(format!("{}", TemperatureUnit::Celsius), "C");
        assert_eq!(format!("{}", TemperatureUnit::Fahrenheit), "F");
    }

    #[test]
    fn test_reading_display() {
        let reading = SensorReading {
            temperature: 23.5,
            unit: TemperatureUnit::Celsius,
            humidity: 50,
            dew_point: 12.5,
            battery: 100,
            rssi: -67,
        };
        assert_eq!(
            format!("{}", reading),
            "temperature=23.5C humidity=50% dew_point=12.5C battery=100% rssi=-67dBm"
        );
    }
}
