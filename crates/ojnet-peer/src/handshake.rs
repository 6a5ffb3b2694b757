use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ojnet_packet::{ConnectionRequest, Packet, PacketCodec, RejectReason, PROTOCOL_VERSION};
use ojnet_transport::{DatagramSocket, MAX_DATAGRAM_SIZE};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};

/// Configuration for the client side of the connection handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long to wait for a reply before resending the request.
    pub timeout: Duration,
    /// Number of requests sent before giving up.
    pub attempts: u32,
    /// Protocol version announced in the request.
    pub protocol_version: u8,
    /// Opaque client identifier carried in the request.
    pub client_id: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            attempts: 5,
            protocol_version: PROTOCOL_VERSION,
            client_id: default_client_id(),
        }
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Server-assigned connection identifier.
    pub server_id: u64,
    /// Address the server answers from for this connection.
    pub remote: SocketAddr,
}

/// Perform the client handshake against `server`.
///
/// `socket` must be bound and not connected. The acceptance may come from a
/// different port of the server host than the one the request went to; on
/// success the socket is connected to that address.
pub fn handshake_client(
    socket: &mut DatagramSocket,
    server: SocketAddr,
    codec: &PacketCodec,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    if config.attempts == 0 {
        return Err(PeerError::HandshakeFailed(
            "handshake attempts must be at least 1".to_string(),
        ));
    }
    if config.timeout.is_zero() {
        return Err(PeerError::HandshakeFailed(
            "handshake timeout must be non-zero".to_string(),
        ));
    }

    let request = codec.encode_packet(
        &ConnectionRequest {
            client_id: config.client_id,
            protocol_version: config.protocol_version,
        }
        .into(),
    )?;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    for attempt in 1..=config.attempts {
        debug!(%server, attempt, "sending connection request");
        socket.send_to(&request, server)?;

        // A timeout too large to land on the clock waits without a deadline.
        let deadline = Instant::now().checked_add(config.timeout);
        loop {
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => Some(remaining),
                    _ => break,
                },
                None => None,
            };
            socket.set_read_timeout(remaining)?;

            let (len, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(err) if err.is_timeout() => break,
                Err(err) => return Err(err.into()),
            };

            if from.ip() != server.ip() {
                debug!(%from, "ignoring datagram from unexpected host during handshake");
                continue;
            }

            match codec.decode_datagram(&buf[..len]) {
                Ok(Packet::ConnectionAccepted(accepted)) => {
                    socket.set_read_timeout(None)?;
                    socket.set_peer(from)?;
                    info!(server_id = accepted.server_id, remote = %from, "connection accepted");
                    return Ok(HandshakeResult {
                        server_id: accepted.server_id,
                        remote: from,
                    });
                }
                Ok(Packet::ConnectionRejected(rejected)) => {
                    warn!(reason = %rejected.reason, "connection rejected");
                    return Err(PeerError::Rejected(rejected.reason));
                }
                Ok(other) => {
                    debug!(kind = %other.kind(), "ignoring packet during handshake");
                }
                // Already logged by the codec.
                Err(_) => {}
            }
        }
    }

    Err(PeerError::Timeout(config.timeout.saturating_mul(config.attempts)))
}

/// Server-side admission rules for connection requests.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Only requests announcing exactly this version are admitted.
    pub protocol_version: u8,
    /// Most connections alive at once.
    pub max_connections: usize,
    /// Minimum spacing between new requests from the same address.
    /// `Duration::ZERO` disables rate limiting.
    pub min_request_interval: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_connections: 64,
            min_request_interval: Duration::from_millis(100),
        }
    }
}

impl AdmissionPolicy {
    /// Decide whether to admit `request`.
    ///
    /// `active` is the number of live connections and `since_last` the time
    /// since the previous request from the same address, if any.
    pub fn evaluate(
        &self,
        request: &ConnectionRequest,
        active: usize,
        since_last: Option<Duration>,
    ) -> std::result::Result<(), RejectReason> {
        if let Some(elapsed) = since_last {
            if elapsed < self.min_request_interval {
                return Err(RejectReason::RateLimited);
            }
        }
        if request.protocol_version != self.protocol_version {
            return Err(RejectReason::IncompatibleProtocolVersion);
        }
        if active >= self.max_connections {
            return Err(RejectReason::MaxConnectionsReached);
        }
        Ok(())
    }
}

fn default_client_id() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ (u64::from(std::process::id()) << 32)
}
