//! Packet kinds and binary encode/decode for the ojnet datagram protocol.
//!
//! Every datagram carries exactly one packet, and the first byte of every
//! packet is its kind id:
//! - `0x01` ConnectionRequest, `0x02` ConnectionAccepted, `0x03` ConnectionRejected
//! - `0x0A` Acknowledge, `0x0B` ChannelOperation, `0x0C` Container
//!
//! All multi-byte integers are big-endian. Decoding validates lengths before
//! touching any field, so a malformed datagram is an error and never a panic.

pub mod channel;
pub mod codec;
pub mod compression;
pub mod error;
pub mod kind;
pub mod packet;
pub mod primitive;
pub mod validate;

pub use channel::{channel_name, is_control, CONTROL};
pub use codec::{CodecConfig, PacketCodec};
pub use compression::{CompressionError, Compressor, Lz4Compressor, DEFAULT_MAX_DECOMPRESSED};
pub use error::{PacketError, Result};
pub use kind::{PacketKind, PROTOCOL_VERSION};
pub use packet::{
    peek_kind, Acknowledge, ChannelOperation, Codec, ConnectionAccepted, ConnectionRejected,
    ConnectionRequest, Container, ContainerFlags, Operation, Packet, RejectReason,
};
pub use validate::{validate, LengthMode};
