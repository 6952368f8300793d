//! Per-provider serialization of registration.
//!
//! The mock registry answers after a delay, so overlapping records really
//! race for the same provider key.

use provider_service::services::{IngestOutcome, RegistrationOutcome, RegistryOperation};
use provider_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

const REGISTRY_DELAY: Duration = Duration::from_millis(100);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_register_once() -> Result<(), anyhow::Error> {
    let server = Arc::new(
        TestProviderServer::spawn(MockRegistryTransport::accepting().with_delay(REGISTRY_DELAY))
            .await?,
    );

    let mut tasks = Vec::new();
    for value in 0..8 {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            server
                .ingestion()
                .ingest(&senml_record(PLAIN_TEMPERATURE_BN, &value.to_string()))
                .await
        }));
    }

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await??);
    }

    assert_eq!(server.mock().operations(), vec![RegistryOperation::Register]);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Registered(_)))
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == IngestOutcome::Updated)
            .count(),
        7
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_providers_register_in_parallel() -> Result<(), anyhow::Error> {
    let server = Arc::new(
        TestProviderServer::spawn(MockRegistryTransport::accepting().with_delay(REGISTRY_DELAY))
            .await?,
    );

    let temperature = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .ingestion()
                .ingest(&senml_record(PLAIN_TEMPERATURE_BN, "21.5"))
                .await
        })
    };
    let humidity = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .ingestion()
                .ingest(&senml_record(PLAIN_HUMIDITY_BN, "41"))
                .await
        })
    };
    temperature.await??;
    humidity.await??;

    let calls = server.mock().calls();
    assert_eq!(calls.len(), 2);
    let (first, second) = (&calls[0], &calls[1]);
    // Each call started before the other one finished
    assert!(first.started_at < second.finished_at);
    assert!(second.started_at < first.finished_at);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_is_not_interleaved_with_other_records() -> Result<(), anyhow::Error> {
    let server = Arc::new(
        TestProviderServer::spawn(
            MockRegistryTransport::accepting()
                .with_delay(REGISTRY_DELAY)
                .with_register_responses(vec![MockResponse::Status(400)]),
        )
        .await?,
    );

    let first = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .ingestion()
                .ingest(&senml_record(PLAIN_TEMPERATURE_BN, "21.5"))
                .await
        })
    };
    tokio::time::sleep(REGISTRY_DELAY / 4).await;
    let second = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .ingestion()
                .ingest(&senml_record(PLAIN_TEMPERATURE_BN, "22.0"))
                .await
        })
    };

    assert_eq!(
        first.await??,
        IngestOutcome::Registered(RegistrationOutcome::ReplacedStale)
    );
    assert_eq!(second.await??, IngestOutcome::Updated);

    assert_eq!(
        server.mock().operations(),
        vec![
            RegistryOperation::Register,
            RegistryOperation::Remove,
            RegistryOperation::Register
        ]
    );
    let calls = server.mock().calls();
    for pair in calls.windows(2) {
        assert!(pair[0].finished_at <= pair[1].started_at);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_read_during_registration_sees_registered_value() -> Result<(), anyhow::Error> {
    let server = Arc::new(
        TestProviderServer::spawn(MockRegistryTransport::accepting().with_delay(REGISTRY_DELAY))
            .await?,
    );
    let record = senml_record(PLAIN_HUMIDITY_BN, "41");

    let ingest = {
        let server = Arc::clone(&server);
        let record = record.clone();
        tokio::spawn(async move { server.ingestion().ingest(&record).await })
    };
    tokio::time::sleep(REGISTRY_DELAY / 4).await;

    // The read blocks on the provider guard until registration completes
    let response = server.plain_get(HUMIDITY_RESOURCE).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, record);

    ingest.await??;
    Ok(())
}
