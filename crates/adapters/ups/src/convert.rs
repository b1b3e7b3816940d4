//! Conversion from NUT variables to canonical sensor entities.
//!
//! Each monitored UPS yields one sensor entity per metric of interest:
//! battery charge, load, runtime, and input voltage. Every sensor carries
//! the raw `ups.status` flag string as an attribute so consumers can tell
//! on-line from on-battery without parsing states.

use std::collections::HashMap;

use omnihub_domain::entity::{AttributeValue, DomainType, EntityState, RawEntity};
use omnihub_domain::error::HubError;

struct Metric {
    variable: &'static str,
    suffix: &'static str,
    label: &'static str,
    unit: &'static str,
}

const METRICS: [Metric; 4] = [
    Metric {
        variable: "battery.charge",
        suffix: "battery",
        label: "Battery",
        unit: "%",
    },
    Metric {
        variable: "ups.load",
        suffix: "load",
        label: "Load",
        unit: "%",
    },
    Metric {
        variable: "battery.runtime",
        suffix: "runtime",
        label: "Runtime",
        unit: "s",
    },
    Metric {
        variable: "input.voltage",
        suffix: "voltage",
        label: "Input Voltage",
        unit: "V",
    },
];

/// Build the sensor reports for one UPS from its variable dump.
/// Metrics the daemon does not expose are skipped.
///
/// # Errors
///
/// Returns a validation error if a builder rejects its inputs (empty UPS
/// name).
pub fn sensors_for(
    ups_name: &str,
    vars: &HashMap<String, String>,
) -> Result<Vec<RawEntity>, HubError> {
    let status = vars.get("ups.status").cloned();

    let mut sensors = Vec::new();
    for metric in &METRICS {
        let Some(value) = vars.get(metric.variable) else {
            continue;
        };

        let mut builder = RawEntity::builder()
            .source_entity_id(format!("ups_{ups_name}_{}", metric.suffix))
            .domain(DomainType::Sensor)
            .friendly_name(format!("{ups_name} {}", metric.label))
            .state(EntityState::Custom(value.clone()))
            .attribute("unit", AttributeValue::String(metric.unit.to_string()))
            .attribute(
                "sensor_type",
                AttributeValue::String(metric.suffix.to_string()),
            );

        if let Ok(numeric) = value.parse::<f64>() {
            builder = builder.attribute("value", AttributeValue::Float(numeric));
        }
        if let Some(status) = &status {
            builder = builder.attribute("ups_status", AttributeValue::String(status.clone()));
        }

        sensors.push(builder.build()?);
    }
    Ok(sensors)
}
