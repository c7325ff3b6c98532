use crate::mac_address::MacAddress;
use crate::reading::{SensorReading, TemperatureUnit};

/// A stable hardware address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Build a Celsius reading with the given temperature and fixed companions.
///
/// Tests can override just the fields they care about.
pub fn reading_at(temperature: f64) -> SensorReading {
    SensorReading {
        temperature,
        unit: TemperatureUnit::Celsius,
        humidity: 50,
        dew_point: 12.5,
        battery: 100,
        rssi: -67,
    }
}
