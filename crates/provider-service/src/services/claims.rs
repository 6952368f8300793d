//! Compact access token claim set.
//!
//! Decrypted tokens carry a flat JSON object:
//!
//! ```json
//! {"s": "json.Temperature", "c": "client1.SmartGrid.SmartGridOperator", "e": 1700000000}
//! ```
//!
//! - `s` - service id, `<interface>.<serviceDefinition>`
//! - `c` - consumer certificate common name
//! - `e` - expiry in unix seconds, `0` or absent means never

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("claims are not a valid JSON object: {0}")]
    Malformed(String),

    #[error("claim '{0}' is missing")]
    MissingClaim(&'static str),
}

/// Decoded access token claims. Constructed per request and discarded after
/// the authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    #[serde(rename = "s")]
    pub service: String,
    #[serde(rename = "c")]
    pub consumer: String,
    #[serde(rename = "e")]
    pub expiry: u64,
}

#[derive(Deserialize)]
struct RawClaims {
    s: Option<String>,
    c: Option<String>,
    e: Option<u64>,
}

impl TokenClaims {
    pub fn decode(bytes: &[u8]) -> Result<Self, ClaimsError> {
        let raw: RawClaims =
            serde_json::from_slice(bytes).map_err(|e| ClaimsError::Malformed(e.to_string()))?;

        Ok(Self {
            service: raw.s.ok_or(ClaimsError::MissingClaim("s"))?,
            consumer: raw.c.ok_or(ClaimsError::MissingClaim("c"))?,
            expiry: raw.e.unwrap_or(0),
        })
    }

    pub fn encode(&self) -> Result<String, ClaimsError> {
        serde_json::to_string(self).map_err(|e| ClaimsError::Malformed(e.to_string()))
    }

    /// `e = 0` never expires; otherwise expired only when strictly before `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry != 0 && self.expiry < now
    }
}
