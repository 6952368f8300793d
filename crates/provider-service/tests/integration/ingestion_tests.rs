//! Sensor ingestion end to end: records in, registry calls and plain reads out.

use provider_service::crypto::authentication_info_from_file;
use provider_service::services::{IngestOutcome, RegistrationOutcome, RegistryOperation};
use provider_test_utils::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_plain_record_registers_and_is_readable() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
    let record = senml_record(PLAIN_HUMIDITY_BN, "41");

    let outcome = server.ingestion().ingest(&record).await?;
    assert_eq!(
        outcome,
        IngestOutcome::Registered(RegistrationOutcome::Created)
    );

    let response = server.plain_get(HUMIDITY_RESOURCE).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, record);

    let calls = server.mock().calls();
    assert_eq!(calls.len(), 1);
    let entry = &calls.first().expect("one call").entry;
    assert_eq!(entry.service_uri, HUMIDITY_RESOURCE);
    assert_eq!(entry.provider.port, TEST_ADVERTISED_PORT);
    assert_eq!(entry.provider.system_name, SYSTEM_NAME);
    assert!(entry.provider.authentication_info.is_none());
    assert_eq!(entry.provided_service.interfaces, vec![SERVICE_INTERFACE]);
    assert!(!entry.provided_service.service_metadata.contains_key("security"));
    Ok(())
}

#[tokio::test]
async fn test_latest_value_wins() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;

    server
        .ingestion()
        .ingest(&senml_record(PLAIN_HUMIDITY_BN, "41"))
        .await?;
    let latest = senml_record(PLAIN_HUMIDITY_BN, "43");
    assert_eq!(
        server.ingestion().ingest(&latest).await?,
        IngestOutcome::Updated
    );

    let response = server.plain_get(HUMIDITY_RESOURCE).await?;
    assert_eq!(response.text().await?, latest);
    assert_eq!(server.mock().call_count(RegistryOperation::Register), 1);
    Ok(())
}

#[tokio::test]
async fn test_secure_record_registers_with_auth_info() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;

    server
        .ingestion()
        .ingest(&senml_record(SECURE_TEMPERATURE_BN, "21.5"))
        .await?;

    let calls = server.mock().calls();
    let entry = &calls.first().expect("one call").entry;
    assert_eq!(entry.provider.port, TEST_ADVERTISED_PORT + 1);
    assert_eq!(
        entry.provider.authentication_info,
        Some(authentication_info_from_file(
            server.keys().provider_public_path()
        )?)
    );
    assert_eq!(
        entry
            .provided_service
            .service_metadata
            .get("security")
            .map(String::as_str),
        Some("token")
    );

    // A secure provider is not served on the plain listener
    let response = server.plain_get(TEMPERATURE_RESOURCE).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_interface_mismatch_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
    server
        .ingestion()
        .ingest(&senml_record(PLAIN_HUMIDITY_BN, "41"))
        .await?;

    let response = server.plain_get("1/2/xml").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.plain_get("1/2").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_rejected_records_register_nothing() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;

    for record in [
        "{}".to_string(),
        r#"{"bn":"1:2:P","bu":"RH","e":[]}"#.to_string(),
        senml_record("1:2:X", "41"),
        senml_record(&format!("{}:{}:P", MOTE_ID, UNKNOWN_SENSOR_ID), "41"),
    ] {
        assert!(server.ingestion().ingest(&record).await.is_err());
    }

    assert!(server.mock().calls().is_empty());
    assert!(server.registry().is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_deregisters_everything() -> Result<(), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
    server
        .ingestion()
        .ingest(&senml_record(PLAIN_HUMIDITY_BN, "41"))
        .await?;
    server
        .ingestion()
        .ingest(&senml_record(SECURE_TEMPERATURE_BN, "21.5"))
        .await?;

    let summary = server.ingestion().deregister_all().await;
    assert_eq!(summary.unregistered, 2);
    assert_eq!(summary.removed, 2);

    let removals: Vec<_> = server
        .mock()
        .calls()
        .into_iter()
        .filter(|c| c.operation == RegistryOperation::Remove)
        .collect();
    assert_eq!(removals.len(), 2);
    assert!(removals
        .iter()
        .all(|c| c.entry.provider.authentication_info.is_none()));
    // Each removal targets the port its provider was registered on
    let mut ports: Vec<u16> = removals.iter().map(|c| c.entry.provider.port).collect();
    ports.sort_unstable();
    assert_eq!(ports, vec![TEST_ADVERTISED_PORT, TEST_ADVERTISED_PORT + 1]);

    let response = server.plain_get(HUMIDITY_RESOURCE).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
