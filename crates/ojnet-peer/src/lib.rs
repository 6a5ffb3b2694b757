//! Connections over the ojnet datagram protocol.
//!
//! This is the "just works" layer: a client handshake with resend, a
//! listener that admits or rejects connection requests, and a [`Peer`] that
//! sends containers on channels and tracks sequence/ordered ids.

pub mod connector;
pub mod error;
pub mod handshake;
pub mod listener;
pub mod peer;

pub use connector::{connect, connect_with_config};
pub use error::{PeerError, Result};
pub use handshake::{handshake_client, AdmissionPolicy, HandshakeConfig, HandshakeResult};
pub use listener::{ListenerConfig, PeerListener};
pub use peer::{Peer, PeerConfig, SendOptions};
