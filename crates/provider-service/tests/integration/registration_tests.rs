//! Registration protocol against an HTTP service registry.
//!
//! Uses wiremock in place of the registry and the real
//! `HttpRegistryTransport`.

use provider_service::errors::RegistrationError;
use provider_service::models::{DescriptorParts, ProviderDescriptor};
use provider_service::services::registry_client::RegistryTls;
use provider_service::services::{HttpRegistryTransport, RegistrationOutcome, RegistryClient};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn descriptor(secure: bool) -> ProviderDescriptor {
    let parts = DescriptorParts {
        system_name: "TemperatureSensor".to_string(),
        service_definition: "Temperature".to_string(),
        service_interface: "json".to_string(),
        service_uri: "1/1/json".to_string(),
        unit: "Celsius".to_string(),
        address: "10.0.0.11".to_string(),
    };
    if secure {
        ProviderDescriptor::secure(parts, 8453, "MIIBIjANBgkqhkiG9w0BAQEFAAOC".to_string())
    } else {
        ProviderDescriptor::plain(parts, 8452)
    }
}

fn client(server: &MockServer) -> RegistryClient {
    let transport = HttpRegistryTransport::new(
        format!("{}/serviceregistry/", server.uri()),
        format!("{}/secure/serviceregistry/", server.uri()),
        Duration::from_secs(5),
        RegistryTls::default(),
    )
    .expect("transport builds");
    RegistryClient::new(Arc::new(transport))
}

/// Method and path of each request the registry received, in order.
async fn received(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| (r.method.to_string(), r.url.path().to_string()))
        .collect()
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_posts_entry() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serviceregistry/register"))
        .and(body_partial_json(serde_json::json!({
            "providedService": {
                "serviceDefinition": "Temperature",
                "interfaces": ["json"],
                "serviceMetadata": {"unit": "Celsius"}
            },
            "provider": {"systemName": "TemperatureSensor", "address": "10.0.0.11", "port": 8452},
            "serviceURI": "1/1/json",
            "version": 1
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).register(&descriptor(false), false).await?;

    assert_eq!(outcome, RegistrationOutcome::Created);
    Ok(())
}

#[tokio::test]
async fn test_conflict_removes_then_registers_once() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serviceregistry/register"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serviceregistry/register"))
        .respond_with(ResponseTemplate::new(201))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/serviceregistry/remove"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).register(&descriptor(false), false).await?;

    assert_eq!(outcome, RegistrationOutcome::ReplacedStale);
    assert_eq!(
        received(&server).await,
        vec![
            ("POST".to_string(), "/serviceregistry/register".to_string()),
            ("PUT".to_string(), "/serviceregistry/remove".to_string()),
            ("POST".to_string(), "/serviceregistry/register".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_removal_stops_the_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serviceregistry/register"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/serviceregistry/remove"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).register(&descriptor(false), false).await;

    assert!(matches!(
        result,
        Err(RegistrationError::RegistrationFailed(_))
    ));
}

#[tokio::test]
async fn test_second_rejection_fails_without_further_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serviceregistry/register"))
        .respond_with(ResponseTemplate::new(400))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/serviceregistry/remove"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).register(&descriptor(false), false).await;

    assert!(matches!(
        result,
        Err(RegistrationError::RegistrationFailed(_))
    ));
}

// ============================================================================
// Payloads and base URI selection
// ============================================================================

#[tokio::test]
async fn test_secure_registration_uses_secure_base_and_strips_auth_info_on_removal(
) -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secure/serviceregistry/register"))
        .and(body_partial_json(serde_json::json!({
            "providedService": {"serviceMetadata": {"unit": "Celsius", "security": "token"}},
            "provider": {"port": 8453, "authenticationInfo": "MIIBIjANBgkqhkiG9w0BAQEFAAOC"}
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/secure/serviceregistry/remove"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.register(&descriptor(true), true).await?;
    client.unregister(&descriptor(true), true).await?;

    let requests = server.received_requests().await.unwrap_or_default();
    let removal = requests
        .iter()
        .find(|r| r.url.path().ends_with("/remove"))
        .expect("removal request sent");
    let body: serde_json::Value = removal.body_json()?;
    assert!(body["provider"].get("authenticationInfo").is_none());
    assert_eq!(body["provider"]["port"], 8453);
    assert_eq!(
        body["providedService"]["serviceMetadata"],
        serde_json::json!({"unit": "Celsius"})
    );
    Ok(())
}

#[tokio::test]
async fn test_unreachable_registry() {
    let transport = HttpRegistryTransport::new(
        "http://127.0.0.1:1/serviceregistry/".to_string(),
        "http://127.0.0.1:1/serviceregistry/".to_string(),
        Duration::from_secs(2),
        RegistryTls::default(),
    )
    .expect("transport builds");
    let client = RegistryClient::new(Arc::new(transport));

    // The failed first attempt triggers a removal, which fails as well
    let result = client.register(&descriptor(false), false).await;
    assert!(matches!(
        result,
        Err(RegistrationError::RegistrationFailed(_))
    ));
}
