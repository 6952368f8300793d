//! Data models for the provider service.
//!
//! The composite key `moteID:sensorID:flags` is parsed once into a
//! [`ProviderKey`]; its wire form is kept for display and logging only.

mod descriptor;
mod senml;

pub use descriptor::{
    DescriptorParts, ProvidedService, ProviderDescriptor, ProviderSystem, ServiceRegistryEntry,
};
pub use senml::SenmlReading;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Registry payload version.
pub const REGISTRY_ENTRY_VERSION: u32 = 1;

/// Metadata key carrying the measurement unit.
pub const METADATA_UNIT: &str = "unit";

/// Metadata key marking token-secured providers.
pub const METADATA_SECURITY: &str = "security";

/// Value of the security marker for token-secured providers.
pub const SECURITY_TOKEN: &str = "token";

/// Composite key parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("expected moteID:sensorID:flags, got '{0}'")]
    Malformed(String),

    #[error("unknown flags '{0}'")]
    UnknownFlags(String),
}

/// Capability flags carried by the last segment of the composite key.
///
/// `P` is mandatory. `S` marks a token-secured provider and `M` asks for
/// MQTT translation. MQTT translation has no secure mode, so `M` wins over
/// `S` and the parsed key is never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProviderFlags {
    pub secure: bool,
    pub mqtt: bool,
}

impl ProviderFlags {
    pub const PLAIN: ProviderFlags = ProviderFlags {
        secure: false,
        mqtt: false,
    };

    pub const SECURE: ProviderFlags = ProviderFlags {
        secure: true,
        mqtt: false,
    };

    fn parse(raw: &str) -> Result<Self, KeyError> {
        let mut provider = false;
        let mut secure = false;
        let mut mqtt = false;

        for flag in raw.chars() {
            match flag {
                'P' => provider = true,
                'S' => secure = true,
                'M' => mqtt = true,
                _ => return Err(KeyError::UnknownFlags(raw.to_string())),
            }
        }

        if !provider {
            return Err(KeyError::UnknownFlags(raw.to_string()));
        }

        Ok(ProviderFlags {
            secure: secure && !mqtt,
            mqtt,
        })
    }
}

impl fmt::Display for ProviderFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("P")?;
        if self.secure {
            f.write_str("S")?;
        }
        if self.mqtt {
            f.write_str("M")?;
        }
        Ok(())
    }
}

/// Structured form of `moteID:sensorID:flags`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    mote_id: String,
    sensor_id: String,
    flags: ProviderFlags,
}

impl ProviderKey {
    pub fn new(mote_id: impl Into<String>, sensor_id: impl Into<String>, flags: ProviderFlags) -> Self {
        Self {
            mote_id: mote_id.into(),
            sensor_id: sensor_id.into(),
            flags,
        }
    }

    /// Parse the wire form, e.g. `1:1:PS`.
    pub fn parse(base_name: &str) -> Result<Self, KeyError> {
        let mut parts = base_name.split(':');
        let (Some(mote_id), Some(sensor_id), Some(flags), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::Malformed(base_name.to_string()));
        };

        if mote_id.is_empty() || sensor_id.is_empty() {
            return Err(KeyError::Malformed(base_name.to_string()));
        }

        Ok(Self::new(mote_id, sensor_id, ProviderFlags::parse(flags)?))
    }

    pub fn mote_id(&self) -> &str {
        &self.mote_id
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn flags(&self) -> ProviderFlags {
        self.flags
    }

    pub fn is_secure(&self) -> bool {
        self.flags.secure
    }

    /// Service URI path registered for this provider: `moteID/sensorID/interface`.
    pub fn service_uri(&self, interface: &str) -> String {
        format!("{}/{}/{}", self.mote_id, self.sensor_id, interface)
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mote_id, self.sensor_id, self.flags)
    }
}

impl FromStr for ProviderKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Registration state of a provider record.
///
/// There is no tracked deregistered state: a record removed at shutdown is
/// simply gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Registered,
}

/// Long-lived per-provider state owned by the provider registry.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    /// Most recent SenML document, served verbatim.
    pub last_value: String,
    pub state: RegistrationState,
    /// Provider private key, secure providers only.
    pub private_key_path: Option<PathBuf>,
    /// Descriptor the provider was registered with, reused for deregistration
    /// and to resolve the expected interface and definition of reads.
    pub descriptor: ProviderDescriptor,
}

impl ProviderRecord {
    pub fn registered(
        last_value: String,
        descriptor: ProviderDescriptor,
        private_key_path: Option<PathBuf>,
    ) -> Self {
        Self {
            last_value,
            state: RegistrationState::Registered,
            private_key_path,
            descriptor,
        }
    }
}
