use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use super::Codec;
use crate::error::{PacketError, Result};
use crate::kind::{PacketKind, PROTOCOL_VERSION};
use crate::primitive::write_u64;
use crate::validate::{validate, LengthMode};

/// ID `0x01`: sent by a client to open a connection.
///
/// ```text
/// [0x01] [client_id u64] [protocol_version u8]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionRequest {
    pub client_id: u64,
    pub protocol_version: u8,
}

impl ConnectionRequest {
    /// Encoded size: id + client id + version.
    pub const LEN: usize = 10;

    /// Request carrying the current protocol version.
    pub fn new(client_id: u64) -> Self {
        Self {
            client_id,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl Codec for ConnectionRequest {
    const KIND: PacketKind = PacketKind::ConnectionRequest;

    fn size_hint(&self) -> usize {
        Self::LEN
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::LEN);
        dst.put_u8(Self::KIND.id());
        write_u64(dst, self.client_id);
        dst.put_u8(self.protocol_version);
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        validate(&mut src, Self::KIND, Self::LEN, LengthMode::Exact)?;
        Ok(Self {
            client_id: src.get_u64(),
            protocol_version: src.get_u8(),
        })
    }
}

/// ID `0x02`: server reply accepting a connection.
///
/// ```text
/// [0x02] [server_id u64]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionAccepted {
    pub server_id: u64,
}

impl ConnectionAccepted {
    /// Encoded size: id + server id.
    pub const LEN: usize = 9;

    pub fn new(server_id: u64) -> Self {
        Self { server_id }
    }
}

impl Codec for ConnectionAccepted {
    const KIND: PacketKind = PacketKind::ConnectionAccepted;

    fn size_hint(&self) -> usize {
        Self::LEN
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::LEN);
        dst.put_u8(Self::KIND.id());
        write_u64(dst, self.server_id);
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        validate(&mut src, Self::KIND, Self::LEN, LengthMode::Exact)?;
        Ok(Self {
            server_id: src.get_u64(),
        })
    }
}

/// Why a server refused a connection.
///
/// The discriminant is the wire value; reordering variants breaks the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectReason {
    IncompatibleProtocolVersion = 0,
    MaxConnectionsReached = 1,
    RateLimited = 2,
}

impl TryFrom<u8> for RejectReason {
    type Error = PacketError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(RejectReason::IncompatibleProtocolVersion),
            1 => Ok(RejectReason::MaxConnectionsReached),
            2 => Ok(RejectReason::RateLimited),
            value => Err(PacketError::InvalidValue {
                field: "reject reason",
                value,
            }),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::IncompatibleProtocolVersion => "incompatible protocol version",
            RejectReason::MaxConnectionsReached => "max connections reached",
            RejectReason::RateLimited => "rate limited",
        })
    }
}

/// ID `0x03`: server reply refusing a connection.
///
/// ```text
/// [0x03] [reason u8]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionRejected {
    pub reason: RejectReason,
}

impl ConnectionRejected {
    /// Encoded size: id + reason.
    pub const LEN: usize = 2;

    pub fn new(reason: RejectReason) -> Self {
        Self { reason }
    }
}

impl Codec for ConnectionRejected {
    const KIND: PacketKind = PacketKind::ConnectionRejected;

    fn size_hint(&self) -> usize {
        Self::LEN
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::LEN);
        dst.put_u8(Self::KIND.id());
        dst.put_u8(self.reason as u8);
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        validate(&mut src, Self::KIND, Self::LEN, LengthMode::Exact)?;
        Ok(Self {
            reason: RejectReason::try_from(src.get_u8())?,
        })
    }
}
