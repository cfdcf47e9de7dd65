//! `RelayServer` — wires the registry, relay, sweeper and HTTP surface
//! together.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::{AppState, build_router};
use crate::net;
use crate::pairing::PairingRegistry;
use crate::relay::Relay;
use crate::shutdown::ShutdownCoordinator;
use crate::sweeper::run_sweeper;
use crate::websocket::ConnectionTable;

/// The PairCam relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<PairingRegistry>,
    table: Arc<ConnectionTable>,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server around its configuration and the installed
    /// metrics recorder handle.
    #[must_use]
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let registry = Arc::new(PairingRegistry::new());
        let table = Arc::new(ConnectionTable::new());
        let relay = Arc::new(Relay::new(
            Arc::clone(&registry),
            Arc::clone(&table),
            config.notify_companion_on_controller_loss,
        ));
        Self {
            config: Arc::new(config),
            registry,
            table,
            relay,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// The pairing registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PairingRegistry> {
        &self.registry
    }

    /// The shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address. Call before `serve` so callers can learn
    /// the actual port when binding port 0.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(listener)
    }

    /// Spawn the expiry sweeper, tied to the shutdown token.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        tokio::spawn(run_sweeper(
            Arc::clone(&self.registry),
            self.config.session_ttl(),
            self.config.sweep_interval(),
            self.shutdown.token(),
        ))
    }

    /// Build the router with pairing URLs advertised for `bound`.
    ///
    /// The advertise host prefers the configured override, then the detected
    /// LAN address; the port is whatever the listener actually bound.
    #[must_use]
    pub fn router_for(&self, bound: SocketAddr) -> axum::Router {
        let advertise_host = self
            .config
            .advertise_host
            .clone()
            .unwrap_or_else(net::local_ip);
        let state = AppState {
            registry: Arc::clone(&self.registry),
            table: Arc::clone(&self.table),
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            advertise_host,
            advertise_port: bound.port(),
            start_time: self.start_time,
        };
        build_router(state)
    }

    /// Serve HTTP on the listener until shutdown is initiated.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let bound = listener.local_addr()?;
        let router = self.router_for(bound);
        let token = self.shutdown.token();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
    }
}
