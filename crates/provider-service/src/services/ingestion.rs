//! Sensor data ingestion.
//!
//! Each SenML record either refreshes the value of a known provider, or
//! registers a new provider first. Registration runs while the per-key
//! guard is held, so concurrent records for one key register it once.

use crate::errors::IngestError;
use crate::models::{ProviderKey, ProviderRecord, SenmlReading};
use crate::observability::metrics::record_ingestion;
use crate::services::descriptor::DescriptorFactory;
use crate::services::mqtt::MqttForwarder;
use crate::services::provider_registry::{ProviderGuard, ProviderRegistry, UpdateOutcome};
use crate::services::registry_client::{RegistrationOutcome, RegistryClient};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one ingested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Value of an already registered provider was replaced.
    Updated,
    /// Provider was registered and its first value stored.
    Registered(RegistrationOutcome),
    /// Record was published over MQTT.
    Forwarded,
    /// MQTT record dropped because no publisher is configured.
    Dropped,
}

impl IngestOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Updated => "updated",
            IngestOutcome::Registered(_) => "registered",
            IngestOutcome::Forwarded => "forwarded",
            IngestOutcome::Dropped => "dropped",
        }
    }
}

/// Summary of a mass deregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeregistrationSummary {
    pub unregistered: usize,
    pub failed: usize,
    pub removed: usize,
}

pub struct IngestionService {
    registry: Arc<ProviderRegistry>,
    registry_client: RegistryClient,
    descriptors: DescriptorFactory,
    mqtt: Option<MqttForwarder>,
    secure_registry: bool,
}

impl IngestionService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        registry_client: RegistryClient,
        descriptors: DescriptorFactory,
        mqtt: Option<MqttForwarder>,
        secure_registry: bool,
    ) -> Self {
        Self {
            registry,
            registry_client,
            descriptors,
            mqtt,
            secure_registry,
        }
    }

    /// Ingest one SenML document.
    ///
    /// # Errors
    ///
    /// - `IngestError::Malformed` / `IngestError::UnknownFlags` - the record
    ///   was rejected and no state changed
    /// - `IngestError::Registration` - the provider could not be registered
    ///   and stays unknown
    /// - `IngestError::Publish` - MQTT translation failed
    #[instrument(skip_all, name = "provider.ingest")]
    pub async fn ingest(&self, raw: &str) -> Result<IngestOutcome, IngestError> {
        let result = self.ingest_record(raw).await;
        match &result {
            Ok(outcome) => record_ingestion(outcome.as_str()),
            Err(IngestError::Malformed(_)) | Err(IngestError::UnknownFlags(_)) => {
                record_ingestion("rejected")
            }
            Err(_) => record_ingestion("failed"),
        }
        result
    }

    async fn ingest_record(&self, raw: &str) -> Result<IngestOutcome, IngestError> {
        let reading = SenmlReading::parse(raw)?;
        let key = ProviderKey::parse(&reading.base_name)?;

        if key.flags().mqtt {
            return self.forward(&key, &reading).await;
        }

        let mut guard = self.registry.lock(&key).await;
        if guard.update_value(reading.raw.clone()) == UpdateOutcome::Updated {
            debug!(target: "provider.services.ingestion", provider = %key, "Value updated");
            return Ok(IngestOutcome::Updated);
        }

        let result = self.register(&key, reading, &mut guard).await;
        self.registry.release(&key, guard).await;
        result
    }

    /// Register `key` and store its first value. Runs under the key's guard.
    async fn register(
        &self,
        key: &ProviderKey,
        reading: SenmlReading,
        guard: &mut ProviderGuard,
    ) -> Result<IngestOutcome, IngestError> {
        let resolved = self.descriptors.resolve(key)?;
        let outcome = self
            .registry_client
            .register(&resolved.descriptor, self.secure_registry)
            .await
            .map_err(|e| {
                error!(
                    target: "provider.services.ingestion",
                    provider = %key,
                    error = %e,
                    "Provider registration failed"
                );
                e
            })?;

        guard.insert_registered(ProviderRecord::registered(
            reading.raw,
            resolved.descriptor,
            resolved.private_key_path,
        ));
        info!(
            target: "provider.services.ingestion",
            provider = %key,
            unit = %reading.unit,
            "Provider registered"
        );

        Ok(IngestOutcome::Registered(outcome))
    }

    async fn forward(
        &self,
        key: &ProviderKey,
        reading: &SenmlReading,
    ) -> Result<IngestOutcome, IngestError> {
        let Some(mqtt) = &self.mqtt else {
            warn!(
                target: "provider.services.ingestion",
                provider = %key,
                "MQTT record dropped, no publisher configured"
            );
            return Ok(IngestOutcome::Dropped);
        };

        mqtt.publish(&mqtt_topic(&reading.base_name), &reading.raw)
            .await?;
        Ok(IngestOutcome::Forwarded)
    }

    /// Unregister every registered provider with the descriptor it was
    /// registered with, then clear the table.
    ///
    /// Unregistration failures are logged and counted; the table is cleared
    /// regardless.
    #[instrument(skip_all, name = "provider.deregister_all")]
    pub async fn deregister_all(&self) -> DeregistrationSummary {
        let mut summary = DeregistrationSummary::default();

        for (key, record) in self.registry.registered().await {
            match self
                .registry_client
                .unregister(&record.descriptor, self.secure_registry)
                .await
            {
                Ok(()) => summary.unregistered += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        target: "provider.services.ingestion",
                        provider = %key,
                        error = %e,
                        "Failed to unregister provider"
                    );
                }
            }
        }

        summary.removed = self.registry.remove_all().await;
        info!(
            target: "provider.services.ingestion",
            unregistered = summary.unregistered,
            failed = summary.failed,
            removed = summary.removed,
            "Providers deregistered"
        );
        summary
    }
}

/// MQTT topic of a record: its base name with `/` separators, flags included.
fn mqtt_topic(base_name: &str) -> String {
    base_name.replace(':', "/")
}
