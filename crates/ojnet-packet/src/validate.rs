//! Shared decode preamble.
//!
//! Every codec starts its decode with [`validate`]: check the buffer length,
//! then check and consume the id byte. Decoding works on a `&[u8]` that is
//! advanced through [`bytes::Buf`], so there is no cursor shared between
//! decodes.

use std::fmt;

use bytes::Buf;

use crate::error::{PacketError, Result};
use crate::kind::PacketKind;

/// How the remaining buffer length is compared with the expected length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMode {
    /// Remaining length must equal the expected length.
    Exact,
    /// Remaining length must be at least the expected length.
    AtLeast,
}

impl fmt::Display for LengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthMode::Exact => f.write_str("exactly"),
            LengthMode::AtLeast => f.write_str("at least"),
        }
    }
}

/// Compare a length against the expected length.
pub fn check_length(actual: usize, expected: usize, mode: LengthMode) -> Result<()> {
    let ok = match mode {
        LengthMode::Exact => actual == expected,
        LengthMode::AtLeast => actual >= expected,
    };
    if ok {
        Ok(())
    } else {
        Err(PacketError::LengthMismatch {
            expected,
            actual,
            mode,
        })
    }
}

/// Validate length and packet id, consuming the id byte.
///
/// On success `src` is positioned at the first field byte.
pub fn validate(
    src: &mut &[u8],
    kind: PacketKind,
    expected_len: usize,
    mode: LengthMode,
) -> Result<()> {
    check_length(src.remaining(), expected_len, mode)?;
    if !src.has_remaining() {
        // Only reachable with `expected_len == 0`; there is still no id byte to read.
        return Err(PacketError::LengthMismatch {
            expected: 1,
            actual: 0,
            mode: LengthMode::AtLeast,
        });
    }

    let actual = src.get_u8();
    if actual != kind.id() {
        return Err(PacketError::IdMismatch {
            expected: kind.id(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_accepts_matching_length() {
        let data = [0x0B, 0x00, 0x01];
        let mut src = &data[..];
        validate(&mut src, PacketKind::ChannelOperation, 3, LengthMode::Exact).unwrap();
        assert_eq!(src, &[0x00, 0x01]);
    }

    #[test]
    fn exact_rejects_longer_buffer() {
        let data = [0x0B, 0x00, 0x01, 0x02];
        let mut src = &data[..];
        let err = validate(&mut src, PacketKind::ChannelOperation, 3, LengthMode::Exact)
            .unwrap_err();
        assert!(matches!(
            err,
            PacketError::LengthMismatch {
                expected: 3,
                actual: 4,
                mode: LengthMode::Exact
            }
        ));
    }

    #[test]
    fn at_least_accepts_longer_buffer() {
        let data = [0x0A, 0x01, 0, 0, 0, 1];
        let mut src = &data[..];
        validate(&mut src, PacketKind::Acknowledge, 2, LengthMode::AtLeast).unwrap();
        assert_eq!(src.len(), 5);
    }

    #[test]
    fn at_least_rejects_short_buffer() {
        let data = [0x0C, 0x00];
        let mut src = &data[..];
        let err = validate(&mut src, PacketKind::Container, 5, LengthMode::AtLeast).unwrap_err();
        assert!(matches!(
            err,
            PacketError::LengthMismatch {
                expected: 5,
                actual: 2,
                ..
            }
        ));
        // Nothing consumed on failure.
        assert_eq!(src.len(), 2);
    }

    #[test]
    fn id_mismatch_reports_both_ids() {
        let data = [0x02, 0x00];
        let mut src = &data[..];
        let err = validate(
            &mut src,
            PacketKind::ConnectionRejected,
            2,
            LengthMode::Exact,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PacketError::IdMismatch {
                expected: 0x03,
                actual: 0x02
            }
        ));
    }

    #[test]
    fn zero_expected_length_on_empty_buffer() {
        let mut src: &[u8] = &[];
        let err = validate(&mut src, PacketKind::Container, 0, LengthMode::AtLeast).unwrap_err();
        assert!(matches!(err, PacketError::LengthMismatch { .. }));
    }

    #[test]
    fn error_message_is_readable() {
        let err = check_length(5, 10, LengthMode::Exact).unwrap_err();
        assert_eq!(
            err.to_string(),
            "length mismatch (expected exactly 10 bytes, got 5)"
        );
    }
}
