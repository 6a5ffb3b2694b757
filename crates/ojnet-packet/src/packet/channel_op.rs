use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use super::Codec;
use crate::channel::{is_control, CONTROL};
use crate::error::{PacketError, Result};
use crate::kind::PacketKind;
use crate::validate::{validate, LengthMode};

/// Channel-level operation.
///
/// The discriminant is the wire value; reordering variants breaks the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    OpenChannel = 0,
    CloseChannel = 1,
    ResetOrderedIds = 2,
}

impl TryFrom<u8> for Operation {
    type Error = PacketError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::OpenChannel),
            1 => Ok(Operation::CloseChannel),
            2 => Ok(Operation::ResetOrderedIds),
            value => Err(PacketError::InvalidValue {
                field: "channel operation",
                value,
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::OpenChannel => "open",
            Operation::CloseChannel => "close",
            Operation::ResetOrderedIds => "reset-ordered-ids",
        })
    }
}

/// ID `0x0B`: open, close or reset a channel.
///
/// Closing channel 0 ends the whole connection.
///
/// ```text
/// [0x0B] [operation u8] [channel u8]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelOperation {
    pub operation: Operation,
    pub channel: u8,
}

impl ChannelOperation {
    /// Encoded size: id + operation + channel.
    pub const LEN: usize = 3;

    pub fn new(operation: Operation, channel: u8) -> Self {
        Self { operation, channel }
    }

    pub fn open(channel: u8) -> Self {
        Self::new(Operation::OpenChannel, channel)
    }

    pub fn close(channel: u8) -> Self {
        Self::new(Operation::CloseChannel, channel)
    }

    pub fn reset_ordered_ids(channel: u8) -> Self {
        Self::new(Operation::ResetOrderedIds, channel)
    }

    /// Close the control channel, terminating the connection.
    pub fn disconnect() -> Self {
        Self::close(CONTROL)
    }

    /// Returns true if this operation terminates the connection.
    pub fn is_disconnect(&self) -> bool {
        self.operation == Operation::CloseChannel && is_control(self.channel)
    }
}

impl Codec for ChannelOperation {
    const KIND: PacketKind = PacketKind::ChannelOperation;

    fn size_hint(&self) -> usize {
        Self::LEN
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::LEN);
        dst.put_u8(Self::KIND.id());
        dst.put_u8(self.operation as u8);
        dst.put_u8(self.channel);
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        validate(&mut src, Self::KIND, Self::LEN, LengthMode::Exact)?;
        let operation = Operation::try_from(src.get_u8())?;
        let channel = src.get_u8();
        Ok(Self { operation, channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let wire = ChannelOperation::reset_ordered_ids(9).encode().unwrap();
        assert_eq!(wire.as_ref(), &[0x0B, 0x02, 0x09]);
    }

    #[test]
    fn roundtrip_each_operation() {
        for op in [
            ChannelOperation::open(1),
            ChannelOperation::close(200),
            ChannelOperation::reset_ordered_ids(255),
        ] {
            let wire = op.encode().unwrap();
            assert_eq!(wire.len(), ChannelOperation::LEN);
            assert_eq!(ChannelOperation::decode(&wire).unwrap(), op);
        }
    }

    #[test]
    fn disconnect_is_close_of_control() {
        let op = ChannelOperation::disconnect();
        assert_eq!(op.encode().unwrap().as_ref(), &[0x0B, 0x01, 0x00]);
        assert!(op.is_disconnect());
        assert!(!ChannelOperation::close(1).is_disconnect());
        assert!(!ChannelOperation::open(CONTROL).is_disconnect());
    }

    #[test]
    fn unknown_operation_rejected() {
        let err = ChannelOperation::decode(&[0x0B, 0x03, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::InvalidValue {
                field: "channel operation",
                value: 3
            }
        ));
    }

    #[test]
    fn truncated() {
        let err = ChannelOperation::decode(&[0x0B, 0x00]).unwrap_err();
        assert!(matches!(err, PacketError::LengthMismatch { expected: 3, .. }));
    }
}
