//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::{AppState, Interpreter};
use crate::config::{DaemonConfig, PondConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::transport::build_transport;
use pond_engine::{CommandInterpreter, NanpPhoneParser, PhoneParser};
use pond_storage::postgres::PostgresPondStorage;
use pond_storage::{InMemoryPondStorage, PondStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Pond daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Connect storage, build the transport and seed the pond.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = connect_storage(&config.storage).await?;
        let transport = build_transport(&config.transport)?;
        let interpreter: Arc<Interpreter> = Arc::new(CommandInterpreter::new(
            storage,
            transport,
            config.pond.policy(),
        ));

        seed_pond(&interpreter, &config.pond).await?;

        let state = AppState::new(
            interpreter,
            Duration::from_secs(config.server.request_timeout_secs),
        );
        Ok(Self { config, state })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("pond daemon listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("pond daemon shutting down");
        Ok(())
    }
}

async fn connect_storage(config: &StorageConfig) -> DaemonResult<Arc<dyn PondStorage>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage; pond state is lost on restart");
            Ok(Arc::new(InMemoryPondStorage::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage =
                PostgresPondStorage::connect_with_options(url, *max_connections, *connect_timeout_secs)
                    .await?;
            tracing::info!(max_connections, "connected to postgres");
            Ok(Arc::new(storage))
        }
    }
}

/// Invite every configured seed number from the bootstrap identity.
async fn seed_pond(interpreter: &Interpreter, pond: &PondConfig) -> DaemonResult<()> {
    let parser = NanpPhoneParser::new();
    for raw in &pond.seed_phones {
        let number = parser
            .parse(raw, &pond.default_region)
            .map_err(|e| DaemonError::Config(format!("invalid seed phone {raw:?}: {e}")))?;
        let phone = number.e164();
        match interpreter.seed(&phone).await? {
            Some(member) => tracing::info!(member = %member.id, "seeded pond member"),
            None => tracing::debug!(phone = %phone, "seed phone already a member"),
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_types::PhoneHandle;

    #[tokio::test]
    async fn seeds_configured_phones_once() {
        let mut config = DaemonConfig::default();
        config.pond.seed_phones = vec!["555-300-0001".into(), "+1 (555) 300-0002".into()];

        let server = Server::new(config.clone()).await.unwrap();
        let interpreter = &server.state.interpreter;
        assert_eq!(interpreter.ledger().counter().await.unwrap(), 4);
        assert!(interpreter
            .directory()
            .find_by_phone(&PhoneHandle::new("+15553000002"))
            .await
            .unwrap()
            .is_some());

        seed_pond(interpreter, &config.pond).await.unwrap();
        assert_eq!(interpreter.ledger().counter().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn malformed_seed_phone_is_a_config_error() {
        let mut config = DaemonConfig::default();
        config.pond.seed_phones = vec!["not a phone".into()];
        assert!(matches!(
            Server::new(config).await,
            Err(DaemonError::Config(_))
        ));
    }
}
