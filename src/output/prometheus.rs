//! Prometheus text exposition formatter (format version 0.0.4).

use crate::output::OutputFormatter;
use crate::reading::SensorReading;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Renders store snapshots as Prometheus gauge families.
///
/// Each quantity becomes one metric family prefixed with the configured
/// name, preceded by its `# HELP` and `# TYPE` lines. Samples are labelled
/// with the location; temperature and dew point additionally carry the
/// device-configured unit since it differs per meter.
pub struct PrometheusFormatter {
    prefix: String,
}

impl PrometheusFormatter {
    pub fn new(prefix: String) -> Self {
        Self { prefix }
    }

    fn gauge<F>(
        &self,
        body: &mut String,
        snapshot: &BTreeMap<String, SensorReading>,
        name: &str,
        help: &str,
        sample: F,
    ) where
        F: Fn(&SensorReading) -> (String, f64),
    {
        let name = format!("{}_{}", self.prefix, name);
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} gauge");
        for (location, reading) in snapshot {
            let (extra_labels, value) = sample(reading);
            let _ = writeln!(
                body,
                "{name}{{location=\"{}\"{extra_labels}}} {value}",
                escape_label(location)
            );
        }
    }
}

/// Escape a label value per the exposition format: backslash, double quote
/// and newline.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl OutputFormatter for PrometheusFormatter {
    fn format(&self, snapshot: &BTreeMap<String, SensorReading>) -> String {
        let mut body = String::new();
        if snapshot.is_empty() {
            return body;
        }

        let unit_label = |r: &SensorReading| format!(",unit=\"{}\"", r.unit);

        self.gauge(
            &mut body,
            snapshot,
            "temperature",
            "Temperature in the unit configured on the meter.",
            |r| (unit_label(r), r.temperature),
        );
        self.gauge(
            &mut body,
            snapshot,
            "dew_point",
            "Dew point derived from temperature and humidity, same unit as temperature.",
            |r| (unit_label(r), r.dew_point),
        );
        self.gauge(
            &mut body,
            snapshot,
            "humidity_percent",
            "Relative humidity in percent.",
            |r| (String::new(), f64::from(r.humidity)),
        );
        self.gauge(
            &mut body,
            snapshot,
            "battery_percent",
            "Battery level in percent.",
            |r| (String::new(), f64::from(r.battery)),
        );
        self.gauge(
            &mut body,
            snapshot,
            "rssi_dbm",
            "Received signal strength of the last advertisement in dBm.",
            |r| (String::new(), f64::from(r.rssi)),
        );

        body
    }
}
