use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use ojnet_packet::PacketCodec;
use ojnet_transport::DatagramSocket;

use crate::error::Result;
use crate::handshake::{handshake_client, HandshakeConfig};
use crate::peer::{Peer, PeerConfig};

/// Connect to a listening peer as a client.
pub fn connect(server: SocketAddr) -> Result<Peer> {
    connect_with_config(server, &HandshakeConfig::default(), None)
}

/// Connect with explicit configuration.
pub fn connect_with_config(
    server: SocketAddr,
    handshake_config: &HandshakeConfig,
    peer_config: Option<PeerConfig>,
) -> Result<Peer> {
    let peer_config = peer_config.unwrap_or_default();
    let codec = PacketCodec::with_config(peer_config.codec.clone());

    let mut socket = DatagramSocket::bind(local_for(server))?;
    let handshake = handshake_client(&mut socket, server, &codec, handshake_config)?;

    Peer::from_parts(
        handshake.server_id,
        socket,
        handshake.remote,
        peer_config,
        None,
    )
}

/// Ephemeral local address able to reach `server`.
fn local_for(server: SocketAddr) -> SocketAddr {
    match server {
        SocketAddr::V4(v4) if v4.ip().is_loopback() => (Ipv4Addr::LOCALHOST, 0).into(),
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(v6) if v6.ip().is_loopback() => (Ipv6Addr::LOCALHOST, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}
