use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use ojnet_packet::{
    ConnectionAccepted, ConnectionRejected, ConnectionRequest, Packet, PacketCodec, RejectReason,
};
use ojnet_transport::{DatagramSocket, MAX_DATAGRAM_SIZE};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::handshake::AdmissionPolicy;
use crate::peer::{Peer, PeerConfig};

/// Listener configuration.
#[derive(Debug, Clone, Default)]
pub struct ListenerConfig {
    /// Who gets admitted.
    pub admission: AdmissionPolicy,
    /// Config handed to every accepted peer.
    pub peer: PeerConfig,
    /// How long `accept` waits for an admissible request. `None` waits forever.
    pub accept_timeout: Option<Duration>,
}

struct Admitted {
    server_id: u64,
    socket: DatagramSocket,
    slot: Weak<()>,
}

/// Accepts connection requests on a UDP port.
///
/// Every accepted connection gets its own socket on an ephemeral port; the
/// acceptance is sent from that socket so the client talks to it from then on.
/// The listening port only ever carries handshake traffic.
pub struct PeerListener {
    socket: DatagramSocket,
    codec: PacketCodec,
    config: ListenerConfig,
    next_server_id: u64,
    admitted: HashMap<SocketAddr, Admitted>,
    last_request: HashMap<SocketAddr, Instant>,
    buf: Vec<u8>,
}

impl PeerListener {
    /// Bind to a local address with default configuration.
    ///
    /// Accepted connections get sockets bound to this address's IP. On a
    /// multi-homed host, bind a specific interface address rather than the
    /// wildcard: a wildcard-bound connection socket may answer from a
    /// different IP than the client targeted, and the client ignores
    /// replies from any host but the one it contacted.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = DatagramSocket::bind(addr)?;
        Ok(Self {
            socket,
            codec: PacketCodec::new(),
            config: ListenerConfig::default(),
            next_server_id: 1,
            admitted: HashMap::new(),
            last_request: HashMap::new(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Override listener configuration.
    pub fn with_config(mut self, config: ListenerConfig) -> Self {
        self.codec = PacketCodec::with_config(config.peer.codec.clone());
        self.config = config;
        self
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Connections accepted by this listener that are still alive.
    pub fn active_connections(&mut self) -> usize {
        self.prune();
        self.admitted.len()
    }

    /// Wait for the next admissible connection request and return its peer.
    ///
    /// Rejected requests are answered and the wait continues. A repeated
    /// request from a client that is already connected gets its acceptance
    /// resent.
    pub fn accept(&mut self) -> Result<Peer> {
        // A timeout too large to land on the clock waits without a deadline.
        let deadline = self
            .config
            .accept_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        loop {
            let timeout = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => Some(remaining),
                    _ => return Err(self.accept_timed_out()),
                },
                None => None,
            };
            self.socket.set_read_timeout(timeout)?;

            let (len, from) = match self.socket.recv_from(&mut self.buf) {
                Ok(received) => received,
                Err(err) if err.is_timeout() => return Err(self.accept_timed_out()),
                Err(err) => return Err(err.into()),
            };

            let request = match self.codec.decode_datagram(&self.buf[..len]) {
                Ok(Packet::ConnectionRequest(request)) => request,
                Ok(other) => {
                    debug!(%from, kind = %other.kind(), "ignoring non-request on listening port");
                    continue;
                }
                Err(_) => continue,
            };

            if let Some(peer) = self.handle_request(request, from)? {
                return Ok(peer);
            }
        }
    }

    fn handle_request(
        &mut self,
        request: ConnectionRequest,
        from: SocketAddr,
    ) -> Result<Option<Peer>> {
        self.prune();

        if let Some(admitted) = self.admitted.get(&from) {
            debug!(%from, server_id = admitted.server_id, "resending acceptance");
            let wire = self
                .codec
                .encode_packet(&ConnectionAccepted::new(admitted.server_id).into())?;
            admitted.socket.send(&wire)?;
            return Ok(None);
        }

        let now = Instant::now();
        let since_last = self
            .last_request
            .get(&from)
            .map(|previous| now.duration_since(*previous));

        let verdict = self
            .config
            .admission
            .evaluate(&request, self.admitted.len(), since_last);
        // Rate-limited retries do not push the window forward.
        if verdict != Err(RejectReason::RateLimited) {
            self.last_request.insert(from, now);
        }

        if let Err(reason) = verdict {
            self.reject(from, reason)?;
            return Ok(None);
        }

        let peer = self.admit(request, from)?;
        Ok(Some(peer))
    }

    fn admit(&mut self, request: ConnectionRequest, from: SocketAddr) -> Result<Peer> {
        let local: SocketAddr = (self.socket.local_addr()?.ip(), 0).into();
        let mut socket = DatagramSocket::bind(local)?;
        socket.set_peer(from)?;

        let server_id = self.next_server_id;
        self.next_server_id = self.next_server_id.wrapping_add(1);

        let wire = self
            .codec
            .encode_packet(&ConnectionAccepted::new(server_id).into())?;
        socket.send(&wire)?;

        let slot = Arc::new(());
        self.admitted.insert(
            from,
            Admitted {
                server_id,
                socket: socket.try_clone()?,
                slot: Arc::downgrade(&slot),
            },
        );
        info!(
            %from,
            server_id,
            client_id = request.client_id,
            "accepted connection"
        );

        Peer::from_parts(server_id, socket, from, self.config.peer.clone(), Some(slot))
    }

    fn reject(&self, to: SocketAddr, reason: RejectReason) -> Result<()> {
        warn!(%to, %reason, "rejecting connection request");
        let wire = self
            .codec
            .encode_packet(&ConnectionRejected::new(reason).into())?;
        self.socket.send_to(&wire, to)?;
        Ok(())
    }

    fn prune(&mut self) {
        self.admitted.retain(|_, admitted| admitted.slot.strong_count() > 0);
        let window = self.config.admission.min_request_interval;
        self.last_request.retain(|_, seen| seen.elapsed() < window);
    }

    fn accept_timed_out(&self) -> PeerError {
        PeerError::Timeout(self.config.accept_timeout.unwrap_or_default())
    }
}

impl std::fmt::Debug for PeerListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerListener")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("config", &self.config)
            .field("admitted", &self.admitted.len())
            .finish()
    }
}
