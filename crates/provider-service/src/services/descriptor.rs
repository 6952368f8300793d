//! Builds registration descriptors from lookup tables.

use crate::crypto::authentication_info_from_file;
use crate::errors::RegistrationError;
use crate::lookup::ProviderLookup;
use crate::models::{DescriptorParts, ProviderDescriptor, ProviderKey};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Descriptor plus the key material a secure provider decrypts tokens with.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub descriptor: ProviderDescriptor,
    pub private_key_path: Option<PathBuf>,
}

/// Resolves everything a provider needs for registration.
#[derive(Clone)]
pub struct DescriptorFactory {
    lookup: Arc<dyn ProviderLookup>,
    address: String,
    port: u16,
    secure_port: u16,
}

impl DescriptorFactory {
    pub fn new(lookup: Arc<dyn ProviderLookup>, address: String, port: u16, secure_port: u16) -> Self {
        Self {
            lookup,
            address,
            port,
            secure_port,
        }
    }

    /// Resolve the descriptor for `key`.
    ///
    /// # Errors
    ///
    /// `RegistrationError::ConfigLookup` if any table entry is missing, or if
    /// a secure provider lacks key paths or its public key cannot be read.
    pub fn resolve(&self, key: &ProviderKey) -> Result<ResolvedProvider, RegistrationError> {
        let (mote, sensor) = (key.mote_id(), key.sensor_id());
        let miss = |what: &str| {
            warn!(
                target: "provider.services.descriptor",
                provider = %key,
                missing = what,
                "Lookup miss"
            );
            RegistrationError::ConfigLookup(format!("no {} for {}", what, key))
        };

        let service_interface = self
            .lookup
            .service_interface(mote, sensor)
            .ok_or_else(|| miss("service interface"))?;
        let parts = DescriptorParts {
            system_name: self
                .lookup
                .system_name(mote)
                .ok_or_else(|| miss("system name"))?,
            service_definition: self
                .lookup
                .service_definition(mote, sensor)
                .ok_or_else(|| miss("service definition"))?,
            service_uri: key.service_uri(&service_interface),
            service_interface,
            unit: self
                .lookup
                .metadata_unit(mote, sensor)
                .ok_or_else(|| miss("unit"))?,
            address: self.address.clone(),
        };

        if !key.is_secure() {
            return Ok(ResolvedProvider {
                descriptor: ProviderDescriptor::plain(parts, self.port),
                private_key_path: None,
            });
        }

        let private_key_path = self
            .lookup
            .private_key_path(mote, sensor)
            .ok_or_else(|| miss("private key path"))?;
        let public_key_path = self
            .lookup
            .public_key_path(mote, sensor)
            .ok_or_else(|| miss("public key path"))?;
        let authentication_info = authentication_info_from_file(&public_key_path)
            .map_err(|e| RegistrationError::ConfigLookup(e.to_string()))?;

        Ok(ResolvedProvider {
            descriptor: ProviderDescriptor::secure(parts, self.secure_port, authentication_info),
            private_key_path: Some(private_key_path),
        })
    }
}
