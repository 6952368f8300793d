//! Static provider lookup tables.
//!
//! Resolves the metadata a provider is registered with from its mote and
//! sensor ids. Tables are loaded once at startup from a JSON file:
//!
//! ```json
//! {
//!   "motes": { "1": "TemperatureSensor" },
//!   "services": [
//!     {
//!       "moteID": "1",
//!       "sensorID": "1",
//!       "serviceDefinition": "Temperature",
//!       "serviceInterface": "json",
//!       "unit": "Celsius",
//!       "privateKeyPath": "keys/1-1.key",
//!       "publicKeyPath": "keys/1-1.pub"
//!     }
//!   ]
//! }
//! ```
//!
//! Relative key paths are resolved against the directory of the table file.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to read lookup table {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid lookup table: {0}")]
    Invalid(String),
}

/// Read-only metadata source for provider registration.
///
/// Every getter returns `None` on a miss.
pub trait ProviderLookup: Send + Sync {
    fn system_name(&self, mote_id: &str) -> Option<String>;

    fn service_definition(&self, mote_id: &str, sensor_id: &str) -> Option<String>;

    fn service_interface(&self, mote_id: &str, sensor_id: &str) -> Option<String>;

    fn metadata_unit(&self, mote_id: &str, sensor_id: &str) -> Option<String>;

    fn private_key_path(&self, mote_id: &str, sensor_id: &str) -> Option<PathBuf>;

    fn public_key_path(&self, mote_id: &str, sensor_id: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRow {
    #[serde(rename = "moteID")]
    mote_id: String,
    #[serde(rename = "sensorID")]
    sensor_id: String,
    service_definition: String,
    service_interface: String,
    unit: String,
    #[serde(default)]
    private_key_path: Option<PathBuf>,
    #[serde(default)]
    public_key_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct LookupFile {
    #[serde(default)]
    motes: HashMap<String, String>,
    #[serde(default)]
    services: Vec<ServiceRow>,
}

/// [`ProviderLookup`] backed by in-memory tables.
#[derive(Debug, Default)]
pub struct StaticLookup {
    motes: HashMap<String, String>,
    services: HashMap<(String, String), ServiceRow>,
}

impl StaticLookup {
    /// Parse tables from JSON. Relative key paths are kept as written.
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        Self::build(json, None)
    }

    /// Load tables from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, LookupError> {
        let json = std::fs::read_to_string(path).map_err(|e| LookupError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let lookup = Self::build(&json, path.parent())?;

        info!(
            target: "provider.lookup",
            path = %path.display(),
            motes = lookup.motes.len(),
            services = lookup.services.len(),
            "Loaded provider lookup tables"
        );
        Ok(lookup)
    }

    fn build(json: &str, base_dir: Option<&Path>) -> Result<Self, LookupError> {
        let file: LookupFile =
            serde_json::from_str(json).map_err(|e| LookupError::Invalid(e.to_string()))?;

        let resolve = |path: Option<PathBuf>| match (path, base_dir) {
            (Some(path), Some(dir)) if path.is_relative() => Some(dir.join(path)),
            (path, _) => path,
        };

        let mut services = HashMap::with_capacity(file.services.len());
        for mut row in file.services {
            row.private_key_path = resolve(row.private_key_path.take());
            row.public_key_path = resolve(row.public_key_path.take());

            let id = (row.mote_id.clone(), row.sensor_id.clone());
            if services.insert(id, row).is_some() {
                return Err(LookupError::Invalid(
                    "duplicate moteID/sensorID service row".to_string(),
                ));
            }
        }

        Ok(Self {
            motes: file.motes,
            services,
        })
    }

    fn row(&self, mote_id: &str, sensor_id: &str) -> Option<&ServiceRow> {
        self.services
            .get(&(mote_id.to_string(), sensor_id.to_string()))
    }
}

impl ProviderLookup for StaticLookup {
    fn system_name(&self, mote_id: &str) -> Option<String> {
        self.motes.get(mote_id).cloned()
    }

    fn service_definition(&self, mote_id: &str, sensor_id: &str) -> Option<String> {
        self.row(mote_id, sensor_id)
            .map(|r| r.service_definition.clone())
    }

    fn service_interface(&self, mote_id: &str, sensor_id: &str) -> Option<String> {
        self.row(mote_id, sensor_id)
            .map(|r| r.service_interface.clone())
    }

    fn metadata_unit(&self, mote_id: &str, sensor_id: &str) -> Option<String> {
        self.row(mote_id, sensor_id).map(|r| r.unit.clone())
    }

    fn private_key_path(&self, mote_id: &str, sensor_id: &str) -> Option<PathBuf> {
        self.row(mote_id, sensor_id)
            .and_then(|r| r.private_key_path.clone())
    }

    fn public_key_path(&self, mote_id: &str, sensor_id: &str) -> Option<PathBuf> {
        self.row(mote_id, sensor_id)
            .and_then(|r| r.public_key_path.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TABLES: &str = r#"{
        "motes": {"1": "TemperatureSensor", "2": "HumiditySensor"},
        "services": [
            {"moteID": "1", "sensorID": "1", "serviceDefinition": "Temperature",
             "serviceInterface": "json", "unit": "Celsius"},
            {"moteID": "2", "sensorID": "1", "serviceDefinition": "Humidity",
             "serviceInterface": "senml", "unit": "RH",
             "privateKeyPath": "keys/2-1.key", "publicKeyPath": "/etc/keys/2-1.pub"}
        ]
    }"#;

    #[test]
    fn test_lookup_hits() {
        let lookup = StaticLookup::from_json(TABLES).unwrap();

        assert_eq!(lookup.system_name("1").as_deref(), Some("TemperatureSensor"));
        assert_eq!(
            lookup.service_definition("1", "1").as_deref(),
            Some("Temperature")
        );
        assert_eq!(lookup.service_interface("2", "1").as_deref(), Some("senml"));
        assert_eq!(lookup.metadata_unit("2", "1").as_deref(), Some("RH"));
        assert_eq!(lookup.private_key_path("1", "1"), None);
        assert_eq!(
            lookup.private_key_path("2", "1"),
            Some(PathBuf::from("keys/2-1.key"))
        );
    }

    #[test]
    fn test_lookup_misses() {
        let lookup = StaticLookup::from_json(TABLES).unwrap();

        assert_eq!(lookup.system_name("9"), None);
        assert_eq!(lookup.service_definition("1", "2"), None);
        assert_eq!(lookup.service_interface("9", "1"), None);
        assert_eq!(lookup.public_key_path("9", "1"), None);
    }

    #[test]
    fn test_relative_key_paths_resolve_against_table_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, TABLES).unwrap();

        let lookup = StaticLookup::from_file(&path).unwrap();

        assert_eq!(
            lookup.private_key_path("2", "1"),
            Some(dir.path().join("keys/2-1.key"))
        );
        assert_eq!(
            lookup.public_key_path("2", "1"),
            Some(PathBuf::from("/etc/keys/2-1.pub"))
        );
    }

    #[test]
    fn test_invalid_tables() {
        assert!(matches!(
            StaticLookup::from_json("{"),
            Err(LookupError::Invalid(_))
        ));
        assert!(matches!(
            StaticLookup::from_json(r#"{"services":[{"moteID":"1"}]}"#),
            Err(LookupError::Invalid(_))
        ));

        let duplicate = r#"{"services":[
            {"moteID":"1","sensorID":"1","serviceDefinition":"a","serviceInterface":"json","unit":"u"},
            {"moteID":"1","sensorID":"1","serviceDefinition":"b","serviceInterface":"json","unit":"u"}
        ]}"#;
        assert!(matches!(
            StaticLookup::from_json(duplicate),
            Err(LookupError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StaticLookup::from_file(Path::new("/nonexistent/tables.json")),
            Err(LookupError::Read { .. })
        ));
    }
}
