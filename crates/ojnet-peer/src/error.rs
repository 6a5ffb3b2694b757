use ojnet_packet::RejectReason;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ojnet_transport::TransportError),

    /// Packet encode/decode error.
    #[error("packet error: {0}")]
    Packet(#[from] ojnet_packet::PacketError),

    /// The server refused the connection request.
    #[error("connection rejected: {0}")]
    Rejected(RejectReason),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The channel is not open on this connection.
    #[error("channel {0} is not open")]
    ChannelClosed(u8),
}

pub type Result<T> = std::result::Result<T, PeerError>;
