use super::{METADATA_SECURITY, METADATA_UNIT, REGISTRY_ENTRY_VERSION, SECURITY_TOKEN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the registry needs to know about one provider, built per
/// registration attempt.
///
/// `authentication_info` is present iff the provider is secure; secure
/// descriptors carry the secure listener port. Use [`ProviderDescriptor::plain`]
/// or [`ProviderDescriptor::secure`] so that both stay in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub system_name: String,
    pub service_definition: String,
    pub service_interface: String,
    pub service_uri: String,
    pub metadata: BTreeMap<String, String>,
    pub authentication_info: Option<String>,
    pub address: String,
    pub port: u16,
}

/// Provider identity shared by plain and secure descriptors.
#[derive(Debug, Clone)]
pub struct DescriptorParts {
    pub system_name: String,
    pub service_definition: String,
    pub service_interface: String,
    pub service_uri: String,
    pub unit: String,
    pub address: String,
}

impl ProviderDescriptor {
    /// Descriptor of a plain provider listening on `port`.
    pub fn plain(parts: DescriptorParts, port: u16) -> Self {
        let metadata = BTreeMap::from([(METADATA_UNIT.to_string(), parts.unit)]);
        Self {
            system_name: parts.system_name,
            service_definition: parts.service_definition,
            service_interface: parts.service_interface,
            service_uri: parts.service_uri,
            metadata,
            authentication_info: None,
            address: parts.address,
            port,
        }
    }

    /// Descriptor of a token-secured provider listening on `secure_port`.
    pub fn secure(parts: DescriptorParts, secure_port: u16, authentication_info: String) -> Self {
        let mut descriptor = Self::plain(parts, secure_port);
        descriptor
            .metadata
            .insert(METADATA_SECURITY.to_string(), SECURITY_TOKEN.to_string());
        descriptor.authentication_info = Some(authentication_info);
        descriptor
    }

    pub fn is_secure(&self) -> bool {
        self.authentication_info.is_some()
    }

    /// Payload of `POST <base>/register`.
    pub fn registration_entry(&self) -> ServiceRegistryEntry {
        let mut metadata = BTreeMap::new();
        if let Some(unit) = self.metadata.get(METADATA_UNIT) {
            metadata.insert(METADATA_UNIT.to_string(), unit.clone());
        }
        if self.is_secure() {
            if let Some(security) = self.metadata.get(METADATA_SECURITY) {
                metadata.insert(METADATA_SECURITY.to_string(), security.clone());
            }
        }

        self.entry(metadata, self.authentication_info.clone())
    }

    /// Payload of `PUT <base>/remove`: unit metadata only, no authentication info.
    pub fn removal_entry(&self) -> ServiceRegistryEntry {
        let metadata = self
            .metadata
            .get(METADATA_UNIT)
            .map(|unit| BTreeMap::from([(METADATA_UNIT.to_string(), unit.clone())]))
            .unwrap_or_default();

        self.entry(metadata, None)
    }

    fn entry(
        &self,
        service_metadata: BTreeMap<String, String>,
        authentication_info: Option<String>,
    ) -> ServiceRegistryEntry {
        ServiceRegistryEntry {
            provided_service: ProvidedService {
                service_definition: self.service_definition.clone(),
                interfaces: vec![self.service_interface.clone()],
                service_metadata,
            },
            provider: ProviderSystem {
                system_name: self.system_name.clone(),
                address: self.address.clone(),
                port: self.port,
                authentication_info,
            },
            service_uri: self.service_uri.clone(),
            version: REGISTRY_ENTRY_VERSION,
        }
    }
}

/// Registry wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistryEntry {
    pub provided_service: ProvidedService,
    pub provider: ProviderSystem,
    #[serde(rename = "serviceURI")]
    pub service_uri: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedService {
    pub service_definition: String,
    pub interfaces: Vec<String>,
    pub service_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSystem {
    pub system_name: String,
    pub address: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_info: Option<String>,
}
