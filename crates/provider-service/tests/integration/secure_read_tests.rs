//! Token-gated reads on the secure listener.
//!
//! Tokens are built with the fixture keys: encrypted to the provider key and
//! signed by the authorization key.

use provider_test_utils::*;
use reqwest::StatusCode;

async fn server_with_secure_provider() -> Result<(TestProviderServer, String), anyhow::Error> {
    let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
    let record = senml_record(SECURE_TEMPERATURE_BN, "21.5");
    server.ingestion().ingest(&record).await?;
    Ok((server, record))
}

async fn denial_body(response: reqwest::Response) -> Result<serde_json::Value, anyhow::Error> {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(response.json().await?)
}

#[tokio::test]
async fn test_valid_token_reads_value() -> Result<(), anyhow::Error> {
    let (server, record) = server_with_secure_provider().await?;
    let token = TestTokenBuilder::new().expires_in(3600).build();

    let response = server
        .secure_get(TEMPERATURE_RESOURCE, &token, CONSUMER_DN)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, record);
    Ok(())
}

#[tokio::test]
async fn test_unescaped_plus_signs_are_restored() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;

    // Several ciphertexts so that at least one carries a '+'
    let tokens: Vec<TestToken> = (0..8)
        .map(|seed| TestTokenBuilder::new().with_rng_seed(seed).build())
        .collect();
    assert!(tokens.iter().any(|t| t.token.contains('+')));

    for token in &tokens {
        let response = server
            .secure_get_raw(TEMPERATURE_RESOURCE, token, CONSUMER_DN)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }
    Ok(())
}

#[tokio::test]
async fn test_every_denial_looks_the_same() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;

    let denials = [
        server
            .secure_get(TEMPERATURE_RESOURCE, &TestTokenBuilder::new().build(), OTHER_CONSUMER_DN)
            .await?,
        server
            .secure_get(TEMPERATURE_RESOURCE, &TestTokenBuilder::new().expired().build(), CONSUMER_DN)
            .await?,
        server
            .secure_get(
                TEMPERATURE_RESOURCE,
                &TestTokenBuilder::new().signed_by_untrusted_key().build(),
                CONSUMER_DN,
            )
            .await?,
        server
            .secure_get(
                TEMPERATURE_RESOURCE,
                &TestTokenBuilder::new()
                    .for_service(SERVICE_INTERFACE, HUMIDITY_DEFINITION)
                    .build(),
                CONSUMER_DN,
            )
            .await?,
        server
            .secure_get(
                TEMPERATURE_RESOURCE,
                &TestTokenBuilder::new().without_claim("c").build(),
                CONSUMER_DN,
            )
            .await?,
        server
            .secure_get(
                TEMPERATURE_RESOURCE,
                &TestTokenBuilder::new()
                    .encrypted_to(test_rsa_key(UNTRUSTED_KEY_SEED).to_public_key())
                    .build(),
                CONSUMER_DN,
            )
            .await?,
    ];

    let mut bodies = Vec::new();
    for response in denials {
        bodies.push(denial_body(response).await?);
    }
    let first = bodies.first().cloned().expect("denials collected");
    assert_eq!(first["error"]["code"], "UNAUTHORIZED");
    assert!(bodies.iter().all(|b| *b == first));
    Ok(())
}

#[tokio::test]
async fn test_missing_client_identity_is_denied() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/{}", server.secure_url(), TEMPERATURE_RESOURCE))
        .query(&TestTokenBuilder::new().build().query_pairs())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_missing_token_is_denied() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;

    let response = reqwest::get(format!("{}/{}", server.secure_url(), TEMPERATURE_RESOURCE)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_unknown_secure_resource_is_not_found() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;
    let token = TestTokenBuilder::new().build();

    // The humidity sensor is not registered as a secure provider
    let response = server
        .secure_get(HUMIDITY_RESOURCE, &token, CONSUMER_DN)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.secure_get("1/1", &token, CONSUMER_DN).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_secure_listener_has_no_plain_endpoints() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;

    let response = reqwest::get(format!("{}/health", server.secure_url())).await?;
    assert_ne!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_token_for_other_interface_is_denied() -> Result<(), anyhow::Error> {
    let (server, _) = server_with_secure_provider().await?;
    let token = TestTokenBuilder::new()
        .for_service("xml", TEMPERATURE_DEFINITION)
        .build();

    // The temperature provider is registered with the json interface only
    let response = server.secure_get("1/1/xml", &token, CONSUMER_DN).await?;
    let body = denial_body(response).await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = server
        .secure_get(TEMPERATURE_RESOURCE, &token, CONSUMER_DN)
        .await?;
    denial_body(response).await?;
    Ok(())
}
