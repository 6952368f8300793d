//! IoT Provider
//!
//! Registers sensor services with the service registry as their first SenML
//! record arrives on stdin, and serves the last value of each provider over
//! HTTP. Secure providers are served one port above the plain ones and
//! require an access token per read.
//!
//! Typing `exit` on stdin, Ctrl+C or SIGTERM unregisters every provider and
//! stops the service.

use provider_service::config::Config;
use provider_service::crypto::RsaTokenCipher;
use provider_service::lookup::StaticLookup;
use provider_service::observability::metrics::init_metrics_recorder;
use provider_service::routes::{self, AppState};
use provider_service::services::{
    AccessHandler, DescriptorFactory, HttpRegistryTransport, IngestionService, MqttForwarder,
    ProviderRegistry, RegistryClient, TokenVerifier,
};
use provider_service::transport::ProviderEndpoint;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stdin line that stops the provider.
const EXIT_COMMAND: &str = "exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provider_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IoT Provider");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        address = %config.address,
        port = config.port,
        secure_port = config.secure_port(),
        secure_registry = config.secure_registry,
        "Configuration loaded successfully"
    );

    let metrics_handle = match init_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let lookup = Arc::new(StaticLookup::from_file(&config.lookup_path).map_err(|e| {
        error!(error = %e, "Failed to load lookup tables");
        e
    })?);
    let cipher = Arc::new(RsaTokenCipher::from_key_file(
        config.authorization_public_key_path.as_deref(),
    )?);
    let transport = Arc::new(HttpRegistryTransport::from_config(&config).map_err(|e| {
        error!(error = %e, "Failed to create registry transport");
        e
    })?);

    let registry = Arc::new(ProviderRegistry::new());
    let ingestion = Arc::new(IngestionService::new(
        Arc::clone(&registry),
        RegistryClient::new(transport),
        DescriptorFactory::new(
            lookup,
            config.address.clone(),
            config.port,
            config.secure_port(),
        ),
        config.mqtt_publish_command.clone().map(MqttForwarder::new),
        config.secure_registry,
    ));
    let access = AccessHandler::new(Arc::clone(&registry), TokenVerifier::new(cipher));
    let state = Arc::new(AppState {
        callbacks: Arc::new(ProviderEndpoint::new(access)),
    });

    // Bind both listeners before reading any record, so a bind failure never
    // leaves registered providers behind
    let plain_listener = bind(&config.bind_host, config.port).await?;
    let secure_listener = bind(&config.secure_bind_host, config.secure_port()).await?;

    let shutdown_token = CancellationToken::new();
    let servers = [
        spawn_server(
            "plain",
            plain_listener,
            routes::build_plain_routes(Arc::clone(&state), metrics_handle),
            shutdown_token.child_token(),
        ),
        spawn_server(
            "secure",
            secure_listener,
            routes::build_secure_routes(state),
            shutdown_token.child_token(),
        ),
    ];

    info!("IoT Provider running - type '{}' or press Ctrl+C to shut down", EXIT_COMMAND);
    run_stdin_ingestion(Arc::clone(&ingestion)).await;

    info!("Shutting down, unregistering providers...");
    let summary = ingestion.deregister_all().await;
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some providers could not be unregistered");
    }

    shutdown_token.cancel();
    for server in servers {
        if let Err(e) = server.await {
            error!(error = %e, "Server task failed");
        }
    }

    info!("IoT Provider shutdown complete");
    Ok(())
}

async fn bind(host: &str, port: u16) -> Result<TcpListener, std::io::Error> {
    TcpListener::bind((host, port)).await.map_err(|e| {
        error!(error = %e, host = %host, port, "Failed to bind listener");
        e
    })
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    app: axum::Router,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match listener.local_addr() {
            Ok(addr) => info!(listener = name, addr = %addr, "Listener started"),
            Err(e) => warn!(listener = name, error = %e, "Listener address unavailable"),
        }
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            token.cancelled().await;
            info!(listener = name, "Listener shutting down");
        });
        if let Err(e) = server.await {
            error!(listener = name, error = %e, "Listener failed");
        }
    })
}

/// Ingest one SenML record per stdin line until `exit` or a shutdown signal.
///
/// Each record is ingested on its own task. Pending records are completed
/// before returning.
async fn run_stdin_ingestion(ingestion: Arc<IngestionService>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let record = line.trim();
                    if record.is_empty() {
                        continue;
                    }
                    if record == EXIT_COMMAND {
                        info!("Exit requested on stdin");
                        break;
                    }
                    let ingestion = Arc::clone(&ingestion);
                    let record = record.to_string();
                    tasks.spawn(async move {
                        if let Err(e) = ingestion.ingest(&record).await {
                            warn!(error = %e, "Sensor record not ingested");
                        }
                    });
                }
                Ok(None) => {
                    info!("Stdin closed, waiting for shutdown signal");
                    (&mut shutdown).await;
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read stdin, waiting for shutdown signal");
                    (&mut shutdown).await;
                    break;
                }
            },
        }
    }

    while tasks.join_next().await.is_some() {}
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
