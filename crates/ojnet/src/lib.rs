//! Binary packet protocol for connection-oriented multiplayer netcode over UDP.
//!
//! ojnet defines six packet kinds (connection request/accept/reject,
//! acknowledgement, channel operation, and the data container), their exact
//! byte layouts, and a small connection layer on top.
//!
//! # Crate Structure
//!
//! - [`transport`]: Blocking UDP datagram socket
//! - [`packet`]: Packet kinds, encode/decode, payload compression
//! - [`peer`]: Handshake, listener, connected peers (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use ojnet_transport::*;
}

/// Re-export packet types.
pub mod packet {
    pub use ojnet_packet::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use ojnet_peer::*;
}
