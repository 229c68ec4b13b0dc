//! Local network helpers.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Address used only to pick the outbound interface; nothing is sent to it.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// IP address of the interface carrying the default route.
///
/// Connecting a UDP socket only resolves the route, so no packet leaves the host.
pub fn local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(ROUTE_PROBE)?;
    Ok(socket.local_addr()?.ip())
}

/// Configured address if present, otherwise the detected one, otherwise loopback.
pub fn advertised_ip(configured: Option<IpAddr>) -> IpAddr {
    if let Some(ip) = configured {
        return ip;
    }
    match local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!(error = %e, "Could not detect local IP, advertising loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
