//! Settings schema.

use serde::{Deserialize, Serialize};

/// Top-level PairCam settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaircamSettings {
    /// Server network and session lifecycle settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Server network and session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Port to bind (0 for auto-assign).
    pub port: u16,
    /// Host embedded in pairing URLs. Defaults to the detected LAN IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<String>,
    /// Session time-to-live in seconds, measured from mint time.
    pub session_ttl_secs: u64,
    /// Interval between expiry sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// WebSocket heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Whether to notify a bound companion when its controller disconnects.
    /// The legacy protocol only notifies in the other direction.
    pub notify_companion_on_controller_loss: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
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

/// Log level for the tracing subscriber.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level (least verbose).
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level written to stderr.
    pub level: LogLevel,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
