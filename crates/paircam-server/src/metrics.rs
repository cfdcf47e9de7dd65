//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Messages dropped on full or closed send channels (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Relay events handled total (counter, labels: event).
pub const RELAY_EVENTS_TOTAL: &str = "relay_events_total";
/// Relay validation errors total (counter, labels: error).
pub const RELAY_ERRORS_TOTAL: &str = "relay_errors_total";
/// Sessions minted total (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Sessions explicitly ended total (counter).
pub const SESSIONS_ENDED_TOTAL: &str = "sessions_ended_total";
/// Sessions evicted by the TTL sweeper total (counter).
pub const SESSIONS_SWEPT_TOTAL: &str = "sessions_swept_total";
/// Live sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();

        // Should produce valid (possibly empty) Prometheus text.
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_SEND_DROPS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            RELAY_EVENTS_TOTAL,
            RELAY_ERRORS_TOTAL,
            SESSIONS_CREATED_TOTAL,
            SESSIONS_ENDED_TOTAL,
            SESSIONS_SWEPT_TOTAL,
            SESSIONS_ACTIVE,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
