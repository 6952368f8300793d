//! MQTT translation for `M`-flagged sensor records.
//!
//! Records are handed to an external publisher executable, invoked as
//! `<command> -t <topic> -q 1 -m <payload>`. Arguments are passed directly
//! to the process; no shell is involved.

use crate::errors::IngestError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Publishes sensor records through an external MQTT client.
#[derive(Debug, Clone)]
pub struct MqttForwarder {
    command: String,
}

impl MqttForwarder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Publish `payload` on `topic` with QoS 1.
    ///
    /// # Errors
    ///
    /// `IngestError::Publish` if the publisher cannot be started or exits
    /// unsuccessfully.
    #[instrument(skip_all, name = "provider.mqtt.publish", fields(topic = %topic))]
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), IngestError> {
        let output = Command::new(&self.command)
            .arg("-t")
            .arg(topic)
            .arg("-q")
            .arg("1")
            .arg("-m")
            .arg(payload)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                warn!(target: "provider.services.mqtt", error = %e, "Failed to start MQTT publisher");
                IngestError::Publish(e.to_string())
            })?;

        if !output.status.success() {
            warn!(
                target: "provider.services.mqtt",
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "MQTT publisher failed"
            );
            return Err(IngestError::Publish(format!(
                "publisher exited with {}",
                output.status
            )));
        }

        debug!(target: "provider.services.mqtt", "Record published");
        Ok(())
    }
}
