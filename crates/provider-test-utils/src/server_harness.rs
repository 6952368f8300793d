//! Test server harness for E2E testing.
//!
//! Provides `TestProviderServer`: the real provider stack on both listeners,
//! wired to fixture keys and lookup tables and to a mock service registry.

use crate::crypto_fixtures::KeyDir;
use crate::lookup_fixtures::lookup_tables;
use crate::token_builders::TestToken;
use provider_service::crypto::RsaTokenCipher;
use provider_service::handlers::CLIENT_DN_HEADER;
use provider_service::routes::{self, AppState};
use provider_service::services::registry_client::mock::MockRegistryTransport;
use provider_service::services::{
    AccessHandler, DescriptorFactory, IngestionService, ProviderRegistry, RegistryClient,
    TokenVerifier,
};
use provider_service::transport::ProviderEndpoint;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Address advertised to the registry by the test server.
pub const TEST_ADVERTISED_ADDRESS: &str = "127.0.0.1";

/// Port advertised to the registry for plain providers.
pub const TEST_ADVERTISED_PORT: u16 = 8452;

/// Test harness for spawning the provider in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
/// let response = reqwest::get(format!("{}/health", server.plain_url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestProviderServer {
    plain_addr: SocketAddr,
    secure_addr: SocketAddr,
    keys: KeyDir,
    registry: Arc<ProviderRegistry>,
    ingestion: Arc<IngestionService>,
    mock: Arc<MockRegistryTransport>,
    client: reqwest::Client,
    handles: Vec<JoinHandle<()>>,
}

impl TestProviderServer {
    /// Spawn both listeners on random local ports.
    ///
    /// Registration goes to `mock`, using the plain registry base.
    pub async fn spawn(mock: MockRegistryTransport) -> Result<Self, anyhow::Error> {
        let keys = KeyDir::new();
        let mock = Arc::new(mock);

        let cipher = RsaTokenCipher::from_key_file(Some(keys.authorization_public_path()))
            .map_err(|e| anyhow::anyhow!("Failed to load authorization key: {}", e))?;

        let registry = Arc::new(ProviderRegistry::new());
        let ingestion = Arc::new(IngestionService::new(
            Arc::clone(&registry),
            RegistryClient::new(mock.clone()),
            DescriptorFactory::new(
                Arc::new(lookup_tables(&keys)),
                TEST_ADVERTISED_ADDRESS.to_string(),
                TEST_ADVERTISED_PORT,
                TEST_ADVERTISED_PORT + 1,
            ),
            None,
            false,
        ));
        let access = AccessHandler::new(
            Arc::clone(&registry),
            TokenVerifier::new(Arc::new(cipher)),
        );
        let state = Arc::new(AppState {
            callbacks: Arc::new(ProviderEndpoint::new(access)),
        });

        let (plain_addr, plain_handle) =
            serve(routes::build_plain_routes(Arc::clone(&state), None)).await?;
        let (secure_addr, secure_handle) = serve(routes::build_secure_routes(state)).await?;

        Ok(Self {
            plain_addr,
            secure_addr,
            keys,
            registry,
            ingestion,
            mock,
            client: reqwest::Client::new(),
            handles: vec![plain_handle, secure_handle],
        })
    }

    /// Base URL of the plain listener.
    pub fn plain_url(&self) -> String {
        format!("http://{}", self.plain_addr)
    }

    /// Base URL of the secure listener.
    pub fn secure_url(&self) -> String {
        format!("http://{}", self.secure_addr)
    }

    pub fn keys(&self) -> &KeyDir {
        &self.keys
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn ingestion(&self) -> &Arc<IngestionService> {
        &self.ingestion
    }

    pub fn mock(&self) -> &MockRegistryTransport {
        &self.mock
    }

    /// GET a resource on the plain listener.
    pub async fn plain_get(&self, resource: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!("{}/{}", self.plain_url(), resource))
            .send()
            .await?)
    }

    /// GET a resource on the secure listener with an escaped token query.
    pub async fn secure_get(
        &self,
        resource: &str,
        token: &TestToken,
        client_dn: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!("{}/{}", self.secure_url(), resource))
            .query(&token.query_pairs())
            .header(CLIENT_DN_HEADER, client_dn)
            .send()
            .await?)
    }

    /// GET a resource on the secure listener with the token query unescaped.
    pub async fn secure_get_raw(
        &self,
        resource: &str,
        token: &TestToken,
        client_dn: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!(
                "{}/{}?{}",
                self.secure_url(),
                resource,
                token.raw_query()
            ))
            .header(CLIENT_DN_HEADER, client_dn)
            .send()
            .await?)
    }
}

async fn serve(app: axum::Router) -> Result<(SocketAddr, JoinHandle<()>), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Test server error: {}", e);
        }
    });

    Ok((addr, handle))
}

impl Drop for TestProviderServer {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;

        assert!(server.plain_url().starts_with("http://127.0.0.1:"));
        assert_ne!(server.plain_url(), server.secure_url());

        let response = reqwest::get(format!("{}/health", server.plain_url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }
}
