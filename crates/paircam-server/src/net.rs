//! LAN address detection and pairing URL construction.

use std::net::UdpSocket;

use paircam_core::SessionToken;
use tracing::debug;

/// Best-effort LAN IP of this host.
///
/// Opens a UDP socket and "connects" it to a routable address; no packet is
/// sent, but the OS picks the outbound interface and its address is what we
/// report. Falls back to loopback when the host has no route.
#[must_use]
pub fn local_ip() -> String {
    let detected = UdpSocket::bind("0.0.0.0:0")
        .and_then(|sock| {
            sock.connect("192.255.255.255:1")?;
            sock.local_addr()
        })
        .map(|addr| addr.ip().to_string());

    match detected {
        Ok(ip) => ip,
        Err(err) => {
            debug!(error = %err, "LAN IP detection failed, using loopback");
            "127.0.0.1".into()
        }
    }
}

/// URL a companion device opens to join a session.
#[must_use]
pub fn pairing_url(host: &str, port: u16, token: &SessionToken) -> String {
    format!("http://{host}:{port}/mobile/{token}")
}
