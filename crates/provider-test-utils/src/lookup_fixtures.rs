//! Lookup tables matching the fixture ids and keys.

use crate::crypto_fixtures::KeyDir;
use crate::test_ids::*;
use provider_service::lookup::StaticLookup;

/// Lookup tables JSON for the fixture mote.
///
/// - sensor 1: Temperature over `json`, with the fixture provider keys
/// - sensor 2: Humidity over `json`, no keys
pub fn lookup_tables_json(keys: &KeyDir) -> String {
    serde_json::json!({
        "motes": { MOTE_ID: SYSTEM_NAME },
        "services": [
            {
                "moteID": MOTE_ID,
                "sensorID": TEMPERATURE_SENSOR_ID,
                "serviceDefinition": TEMPERATURE_DEFINITION,
                "serviceInterface": SERVICE_INTERFACE,
                "unit": "Celsius",
                "privateKeyPath": keys.provider_private_path(),
                "publicKeyPath": keys.provider_public_path(),
            },
            {
                "moteID": MOTE_ID,
                "sensorID": HUMIDITY_SENSOR_ID,
                "serviceDefinition": HUMIDITY_DEFINITION,
                "serviceInterface": SERVICE_INTERFACE,
                "unit": "RH",
            }
        ]
    })
    .to_string()
}

/// Parsed fixture lookup tables.
pub fn lookup_tables(keys: &KeyDir) -> StaticLookup {
    StaticLookup::from_json(&lookup_tables_json(keys)).expect("fixture lookup tables are valid")
}
