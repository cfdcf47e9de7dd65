//! Server configuration.

use std::time::Duration;

use paircam_settings::PaircamSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the PairCam server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Host embedded in pairing URLs. `None` means detect the LAN IP.
    pub advertise_host: Option<String>,
    /// Session time-to-live in seconds, measured from mint time.
    pub session_ttl_secs: u64,
    /// Interval between expiry sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Whether to notify a bound companion when its controller disconnects.
    pub notify_companion_on_controller_loss: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            advertise_host: None,
            session_ttl_secs: 300,
            sweep_interval_secs: 60,
            max_connections: 100,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            notify_companion_on_controller_loss: false,
        }
    }
}

impl ServerConfig {
    /// Build a config from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &PaircamSettings) -> Self {
        let s = &settings.server;
        Self {
            host: s.host.clone(),
            port: s.port,
            advertise_host: s.advertise_host.clone(),
            session_ttl_secs: s.session_ttl_secs,
            sweep_interval_secs: s.sweep_interval_secs,
            max_connections: s.max_connections,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            max_message_size: s.max_message_size,
            notify_companion_on_controller_loss: s.notify_companion_on_controller_loss,
        }
    }

    /// Session TTL as a [`Duration`].
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Heartbeat ping interval as a [`Duration`].
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pong timeout as a [`Duration`].
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}
