//! Packet codecs and the `Packet` dispatch type.

mod acknowledge;
mod channel_op;
mod container;
mod handshake;

use bytes::{Bytes, BytesMut};

pub use acknowledge::Acknowledge;
pub use channel_op::{ChannelOperation, Operation};
pub use container::{Container, ContainerFlags};
pub use handshake::{ConnectionAccepted, ConnectionRejected, ConnectionRequest, RejectReason};

use crate::compression::{Compressor, Lz4Compressor};
use crate::error::{PacketError, Result};
use crate::kind::PacketKind;

/// Encode/decode contract shared by every packet kind.
pub trait Codec: Sized {
    /// Kind id written as the first byte.
    const KIND: PacketKind;

    /// Capacity hint for the encoded form.
    fn size_hint(&self) -> usize;

    /// Append the encoded packet to `dst`.
    ///
    /// On error nothing has been written.
    fn encode_into(&self, dst: &mut BytesMut) -> Result<()>;

    /// Decode a packet from a complete datagram.
    fn decode(src: &[u8]) -> Result<Self>;

    /// Encode into a fresh buffer.
    fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.size_hint());
        self.encode_into(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Any packet of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ConnectionRequest(ConnectionRequest),
    ConnectionAccepted(ConnectionAccepted),
    ConnectionRejected(ConnectionRejected),
    Acknowledge(Acknowledge),
    ChannelOperation(ChannelOperation),
    Container(Container),
}

impl Packet {
    /// Kind of this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::ConnectionRequest(_) => PacketKind::ConnectionRequest,
            Packet::ConnectionAccepted(_) => PacketKind::ConnectionAccepted,
            Packet::ConnectionRejected(_) => PacketKind::ConnectionRejected,
            Packet::Acknowledge(_) => PacketKind::Acknowledge,
            Packet::ChannelOperation(_) => PacketKind::ChannelOperation,
            Packet::Container(_) => PacketKind::Container,
        }
    }

    /// Encode using the default LZ4 compressor for compressed containers.
    pub fn encode(&self) -> Result<Bytes> {
        self.encode_with(&Lz4Compressor::default())
    }

    /// Encode with an explicit payload compressor.
    pub fn encode_with(&self, compressor: &dyn Compressor) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode_into_with(&mut dst, compressor)?;
        Ok(dst.freeze())
    }

    /// Append the encoded packet to `dst`.
    pub fn encode_into_with(&self, dst: &mut BytesMut, compressor: &dyn Compressor) -> Result<()> {
        match self {
            Packet::ConnectionRequest(p) => p.encode_into(dst),
            Packet::ConnectionAccepted(p) => p.encode_into(dst),
            Packet::ConnectionRejected(p) => p.encode_into(dst),
            Packet::Acknowledge(p) => p.encode_into(dst),
            Packet::ChannelOperation(p) => p.encode_into(dst),
            Packet::Container(p) => p.encode_into_with(dst, compressor),
        }
    }

    /// Classify a datagram by its first byte and decode it.
    pub fn decode(src: &[u8]) -> Result<Self> {
        Self::decode_with(src, &Lz4Compressor::default())
    }

    /// Classify and decode with an explicit payload compressor.
    pub fn decode_with(src: &[u8], compressor: &dyn Compressor) -> Result<Self> {
        let kind = peek_kind(src)?;
        Self::decode_as_with(kind, src, compressor)
    }

    /// Decode a datagram that must be of the given kind.
    pub fn decode_as(kind: PacketKind, src: &[u8]) -> Result<Self> {
        Self::decode_as_with(kind, src, &Lz4Compressor::default())
    }

    /// Decode as a given kind with an explicit payload compressor.
    pub fn decode_as_with(
        kind: PacketKind,
        src: &[u8],
        compressor: &dyn Compressor,
    ) -> Result<Self> {
        let packet = match kind {
            PacketKind::ConnectionRequest => ConnectionRequest::decode(src)?.into(),
            PacketKind::ConnectionAccepted => ConnectionAccepted::decode(src)?.into(),
            PacketKind::ConnectionRejected => ConnectionRejected::decode(src)?.into(),
            PacketKind::Acknowledge => Acknowledge::decode(src)?.into(),
            PacketKind::ChannelOperation => ChannelOperation::decode(src)?.into(),
            PacketKind::Container => Container::decode_with(src, compressor)?.into(),
        };
        Ok(packet)
    }
}

/// Look up the kind of a datagram from its leading id byte.
pub fn peek_kind(src: &[u8]) -> Result<PacketKind> {
    let id = *src.first().ok_or(PacketError::Empty)?;
    PacketKind::try_from(id)
}

macro_rules! impl_from_packet {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(packet: $variant) -> Self {
                    Packet::$variant(packet)
                }
            }
        )+
    };
}

impl_from_packet!(
    ConnectionRequest,
    ConnectionAccepted,
    ConnectionRejected,
    Acknowledge,
    ChannelOperation,
    Container,
);
