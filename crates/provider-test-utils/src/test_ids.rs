//! Fixed test identifiers.
//!
//! Values match the fixture lookup tables in `lookup_fixtures`.

/// Mote carrying every fixture sensor.
pub const MOTE_ID: &str = "1";

/// Temperature sensor, registered secure in the fixtures.
pub const TEMPERATURE_SENSOR_ID: &str = "1";

/// Humidity sensor, plain only.
pub const HUMIDITY_SENSOR_ID: &str = "2";

/// Sensor with no lookup entry.
pub const UNKNOWN_SENSOR_ID: &str = "9";

pub const SYSTEM_NAME: &str = "TemperatureSensor";

pub const TEMPERATURE_DEFINITION: &str = "Temperature";
pub const HUMIDITY_DEFINITION: &str = "Humidity";
pub const SERVICE_INTERFACE: &str = "json";

/// Base names as they appear in SenML `bn`.
pub const PLAIN_TEMPERATURE_BN: &str = "1:1:P";
pub const SECURE_TEMPERATURE_BN: &str = "1:1:PS";
pub const PLAIN_HUMIDITY_BN: &str = "1:2:P";

/// Resource paths.
pub const TEMPERATURE_RESOURCE: &str = "1/1/json";
pub const HUMIDITY_RESOURCE: &str = "1/2/json";

/// Consumer common name as carried in token claims.
pub const CONSUMER_COMMON_NAME: &str = "client1.SmartGrid.SmartGridOperator";

/// Subject DN of the consumer named in [`CONSUMER_COMMON_NAME`].
pub const CONSUMER_DN: &str = "C=HU,CN=client1.SmartGrid.SmartGridOperator";

/// Subject DN of a different consumer.
pub const OTHER_CONSUMER_DN: &str = "C=HU,CN=client2.Other.Op";

/// Build a single-entry SenML record.
pub fn senml_record(base_name: &str, value: &str) -> String {
    serde_json::json!({
        "bn": base_name,
        "bu": "Celsius",
        "e": [{"sv": value}]
    })
    .to_string()
}
