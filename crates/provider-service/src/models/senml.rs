use crate::errors::IngestError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SenmlPack {
    bn: Option<String>,
    bu: Option<String>,
    #[serde(default)]
    e: Vec<SenmlEntry>,
}

#[derive(Debug, Deserialize)]
struct SenmlEntry {
    sv: Option<String>,
}

/// A validated SenML sensor reading.
///
/// Only the fields the provider relies on are checked: `bn` (the composite
/// key), `bu` (unit) and a string value `sv` on the first entry. The raw
/// document is kept and served verbatim as the provider's last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenmlReading {
    pub base_name: String,
    pub unit: String,
    pub value: String,
    pub raw: String,
}

impl SenmlReading {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let pack: SenmlPack = serde_json::from_str(raw)
            .map_err(|e| IngestError::Malformed(format!("invalid JSON: {}", e)))?;

        let base_name = pack
            .bn
            .ok_or_else(|| IngestError::Malformed("missing bn".to_string()))?;
        let unit = pack
            .bu
            .ok_or_else(|| IngestError::Malformed("missing bu".to_string()))?;
        let value = pack
            .e
            .into_iter()
            .next()
            .and_then(|entry| entry.sv)
            .ok_or_else(|| IngestError::Malformed("missing e[0].sv".to_string()))?;

        Ok(Self {
            base_name,
            unit,
            value,
            raw: raw.to_string(),
        })
    }
}
