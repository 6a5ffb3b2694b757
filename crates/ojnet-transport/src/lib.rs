//! Blocking UDP datagram transport.
//!
//! This is the lowest layer of ojnet. It moves whole datagrams and knows
//! nothing about packet layouts; everything else builds on the
//! [`DatagramSocket`] type provided here.

pub mod error;
pub mod socket;

pub use error::{Result, TransportError};
pub use socket::{DatagramSocket, MAX_DATAGRAM_SIZE};
