use std::fmt;
use std::ops::BitOr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::Codec;
use crate::compression::{CompressionError, Compressor, Lz4Compressor};
use crate::error::{PacketError, Result};
use crate::kind::PacketKind;
use crate::primitive::{write_u16, write_u32};
use crate::validate::{check_length, validate, LengthMode};

/// Container flags byte.
///
/// Bit 0 = reliable, bit 1 = ordered, bit 2 = compressed. Bits 3-7 are
/// reserved and must be zero on the wire.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContainerFlags(u8);

impl ContainerFlags {
    pub const RELIABLE: Self = Self(1 << 0);
    pub const ORDERED: Self = Self(1 << 1);
    pub const COMPRESSED: Self = Self(1 << 2);

    const KNOWN_BITS: u8 = 0b0000_0111;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Parse a wire flags byte, rejecting reserved bits.
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return Err(PacketError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn reliable(self) -> bool {
        self.contains(Self::RELIABLE)
    }

    pub const fn ordered(self) -> bool {
        self.contains(Self::ORDERED)
    }

    pub const fn compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }
}

impl BitOr for ContainerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ContainerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFlags")
            .field("reliable", &self.reliable())
            .field("ordered", &self.ordered())
            .field("compressed", &self.compressed())
            .finish()
    }
}

/// ID `0x0C`: envelope for every application payload.
///
/// ```text
/// [0x0C] [channel u8] [flags u8] [sequence_id u32]? [ordered_id u16]? [len u16] [payload]
/// ```
///
/// `sequence_id` is on the wire iff the packet is reliable and `ordered_id`
/// iff it is ordered. `payload` always holds the uncompressed bytes; when
/// `compressed` is set the wire carries the compressor's output instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    pub channel: u8,
    pub sequence_id: Option<u32>,
    pub ordered_id: Option<u16>,
    pub compressed: bool,
    pub payload: Bytes,
}

/// Header fields whose presence is decided by the flags byte.
struct Header {
    channel: u8,
    flags: ContainerFlags,
    sequence_id: Option<u32>,
    ordered_id: Option<u16>,
    payload_len: usize,
}

impl Header {
    fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(self.channel);
        dst.put_u8(self.flags.bits());
        if let Some(sequence_id) = self.sequence_id {
            write_u32(dst, sequence_id);
        }
        if let Some(ordered_id) = self.ordered_id {
            write_u16(dst, ordered_id);
        }
        write_u16(dst, self.payload_len as u16);
    }

    /// Read the header after the id byte. `total` is the full datagram length.
    fn read(src: &mut &[u8], total: usize) -> Result<Self> {
        let channel = src.get_u8();
        let flags = ContainerFlags::from_bits(src.get_u8())?;
        check_length(total, Container::header_len(flags), LengthMode::AtLeast)?;

        let sequence_id = flags.reliable().then(|| src.get_u32());
        let ordered_id = flags.ordered().then(|| src.get_u16());
        let payload_len = usize::from(src.get_u16());

        Ok(Self {
            channel,
            flags,
            sequence_id,
            ordered_id,
            payload_len,
        })
    }
}

impl Container {
    /// Size with no optional fields and an empty payload:
    /// id + channel + flags + length prefix.
    pub const BASE_LEN: usize = 5;

    /// Largest payload the u16 length prefix can describe.
    pub const MAX_WIRE_PAYLOAD: usize = u16::MAX as usize;

    /// Unreliable, unordered, uncompressed container.
    pub fn new(channel: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            sequence_id: None,
            ordered_id: None,
            compressed: false,
            payload: payload.into(),
        }
    }

    /// Mark reliable with the given sequence id.
    pub fn with_sequence_id(mut self, sequence_id: u32) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }

    /// Mark ordered with the given ordered id.
    pub fn with_ordered_id(mut self, ordered_id: u16) -> Self {
        self.ordered_id = Some(ordered_id);
        self
    }

    /// Compress the payload on the wire.
    pub fn with_compression(mut self) -> Self {
        self.compressed = true;
        self
    }

    pub fn is_reliable(&self) -> bool {
        self.sequence_id.is_some()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered_id.is_some()
    }

    /// Flags byte derived from which optional fields are set.
    pub fn flags(&self) -> ContainerFlags {
        let mut flags = ContainerFlags::empty();
        if self.is_reliable() {
            flags = flags | ContainerFlags::RELIABLE;
        }
        if self.is_ordered() {
            flags = flags | ContainerFlags::ORDERED;
        }
        if self.compressed {
            flags = flags | ContainerFlags::COMPRESSED;
        }
        flags
    }

    /// Header size, id byte and length prefix included.
    pub const fn header_len(flags: ContainerFlags) -> usize {
        let mut len = Self::BASE_LEN;
        if flags.reliable() {
            len += 4;
        }
        if flags.ordered() {
            len += 2;
        }
        len
    }

    /// Encoded size for the given flags and on-wire payload length.
    pub const fn wire_len(flags: ContainerFlags, wire_payload_len: usize) -> usize {
        Self::header_len(flags) + wire_payload_len
    }

    /// Encode with an explicit payload compressor.
    pub fn encode_with(&self, compressor: &dyn Compressor) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.size_hint());
        self.encode_into_with(&mut dst, compressor)?;
        Ok(dst.freeze())
    }

    /// Append the encoded container to `dst`. On error nothing is written.
    pub fn encode_into_with(&self, dst: &mut BytesMut, compressor: &dyn Compressor) -> Result<()> {
        let wire_payload = if self.compressed {
            compressor.compress(&self.payload)?
        } else {
            self.payload.clone()
        };
        if wire_payload.len() > Self::MAX_WIRE_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                size: wire_payload.len(),
                max: Self::MAX_WIRE_PAYLOAD,
            });
        }

        let header = Header {
            channel: self.channel,
            flags: self.flags(),
            sequence_id: self.sequence_id,
            ordered_id: self.ordered_id,
            payload_len: wire_payload.len(),
        };

        dst.reserve(Self::wire_len(header.flags, wire_payload.len()));
        dst.put_u8(Self::KIND.id());
        header.write(dst);
        dst.put_slice(&wire_payload);
        Ok(())
    }

    /// Decode with an explicit payload compressor.
    pub fn decode_with(mut src: &[u8], compressor: &dyn Compressor) -> Result<Self> {
        let total = src.len();
        validate(&mut src, Self::KIND, Self::BASE_LEN, LengthMode::AtLeast)?;

        let header = Header::read(&mut src, total)?;
        check_length(
            total,
            Self::wire_len(header.flags, header.payload_len),
            LengthMode::Exact,
        )?;

        let wire_payload = &src[..header.payload_len];
        let payload = if header.flags.compressed() {
            compressor
                .decompress(wire_payload)
                .map_err(|err| match err {
                    CompressionError::TooLarge { size, max } => {
                        PacketError::PayloadTooLarge { size, max }
                    }
                    other => other.into(),
                })?
        } else {
            Bytes::copy_from_slice(wire_payload)
        };

        Ok(Self {
            channel: header.channel,
            sequence_id: header.sequence_id,
            ordered_id: header.ordered_id,
            compressed: header.flags.compressed(),
            payload,
        })
    }
}

impl Codec for Container {
    const KIND: PacketKind = PacketKind::Container;

    fn size_hint(&self) -> usize {
        Self::wire_len(self.flags(), self.payload.len())
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        self.encode_into_with(dst, &Lz4Compressor::default())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Self::decode_with(src, &Lz4Compressor::default())
    }
}
