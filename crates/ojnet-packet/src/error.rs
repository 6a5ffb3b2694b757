use crate::compression::CompressionError;
use crate::validate::LengthMode;

/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The buffer does not have the length the packet layout requires.
    #[error("length mismatch (expected {mode} {expected} bytes, got {actual})")]
    LengthMismatch {
        expected: usize,
        actual: usize,
        mode: LengthMode,
    },

    /// The leading id byte is not the one the decoder was asked for.
    #[error("packet id mismatch (expected {expected:#04x}, got {actual:#04x})")]
    IdMismatch { expected: u8, actual: u8 },

    /// The leading id byte is not a registered packet kind.
    #[error("unknown packet id {0:#04x}")]
    UnknownKind(u8),

    /// A zero-length datagram cannot carry a packet.
    #[error("empty datagram")]
    Empty,

    /// A one-byte enum field holds a value outside its declared range.
    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u8 },

    /// A container flags byte has reserved bits set.
    #[error("reserved container flag bits set ({0:#010b})")]
    InvalidFlags(u8),

    /// An encode precondition was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The payload does not fit the wire format or the configured limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload compressor failed.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// An I/O error surfaced through the async datagram codec.
    #[cfg(feature = "async")]
    #[error("datagram I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PacketError>;
