use bytes::{Buf, BufMut, BytesMut};

use super::Codec;
use crate::error::{PacketError, Result};
use crate::kind::PacketKind;
use crate::primitive::write_u32;
use crate::validate::{check_length, validate, LengthMode};

/// ID `0x0A`: acknowledges one or more reliable packets by sequence id.
///
/// ```text
/// [0x0A] [count u8] [sequence_id u32] * count
/// ```
///
/// Encoding requires at least one id. Decoding a count of zero is accepted
/// and yields an empty set; peers on protocol version 0 rely on both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Acknowledge {
    pub sequence_ids: Vec<u32>,
}

impl Acknowledge {
    /// Size of an acknowledge with no ids: id + count byte.
    pub const BASE_LEN: usize = 2;

    /// Most ids one packet can carry (one-byte count).
    pub const MAX_SEQUENCE_IDS: usize = u8::MAX as usize;

    pub fn new(sequence_ids: impl Into<Vec<u32>>) -> Self {
        Self {
            sequence_ids: sequence_ids.into(),
        }
    }

    /// Split any number of ids into packets of at most 255 ids each.
    pub fn batches(sequence_ids: &[u32]) -> Vec<Acknowledge> {
        sequence_ids
            .chunks(Self::MAX_SEQUENCE_IDS)
            .map(|chunk| Acknowledge::new(chunk.to_vec()))
            .collect()
    }

    /// Encoded size for `count` ids.
    pub const fn wire_len(count: usize) -> usize {
        Self::BASE_LEN + 4 * count
    }

    pub fn len(&self) -> usize {
        self.sequence_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence_ids.is_empty()
    }
}

impl Codec for Acknowledge {
    const KIND: PacketKind = PacketKind::Acknowledge;

    fn size_hint(&self) -> usize {
        Self::wire_len(self.sequence_ids.len())
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let count = self.sequence_ids.len();
        if count == 0 {
            return Err(PacketError::InvalidArgument(
                "acknowledge requires at least one sequence id",
            ));
        }
        if count > Self::MAX_SEQUENCE_IDS {
            return Err(PacketError::InvalidArgument(
                "acknowledge carries at most 255 sequence ids",
            ));
        }

        dst.reserve(Self::wire_len(count));
        dst.put_u8(Self::KIND.id());
        dst.put_u8(count as u8);
        for &id in &self.sequence_ids {
            write_u32(dst, id);
        }
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Result<Self> {
        let total = src.len();
        validate(&mut src, Self::KIND, Self::BASE_LEN, LengthMode::AtLeast)?;

        let count = usize::from(src.get_u8());
        check_length(total, Self::wire_len(count), LengthMode::Exact)?;

        let sequence_ids = (0..count).map(|_| src.get_u32()).collect();
        Ok(Self { sequence_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let wire = Acknowledge::new(vec![7, 99]).encode().unwrap();
        assert_eq!(wire.as_ref(), &[0x0A, 0x02, 0, 0, 0, 7, 0, 0, 0, 99]);
    }

    #[test]
    fn roundtrip_preserves_order() {
        let ack = Acknowledge::new(vec![5, 1, u32::MAX, 0, 5]);
        let wire = ack.encode().unwrap();
        assert_eq!(wire.len(), Acknowledge::wire_len(5));
        assert_eq!(Acknowledge::decode(&wire).unwrap(), ack);
    }

    #[test]
    fn max_ids_roundtrip() {
        let ids: Vec<u32> = (0..255).collect();
        let wire = Acknowledge::new(ids.clone()).encode().unwrap();
        assert_eq!(wire.len(), 2 + 4 * 255);
        assert_eq!(wire[1], 255);
        assert_eq!(Acknowledge::decode(&wire).unwrap().sequence_ids, ids);
    }

    // Encode refuses an empty set while decode accepts count 0. Both sides
    // are kept as-is for wire compatibility with protocol version 0.
    #[test]
    fn empty_set_encode_fails() {
        let err = Acknowledge::default().encode().unwrap_err();
        assert!(matches!(err, PacketError::InvalidArgument(_)));
    }

    #[test]
    fn zero_count_decodes_to_empty_set() {
        let ack = Acknowledge::decode(&[0x0A, 0x00]).unwrap();
        assert!(ack.is_empty());
    }

    #[test]
    fn too_many_ids_rejected() {
        let err = Acknowledge::new(vec![1; 256]).encode().unwrap_err();
        assert!(matches!(err, PacketError::InvalidArgument(_)));
    }

    #[test]
    fn encode_failure_writes_nothing() {
        let mut dst = BytesMut::new();
        assert!(Acknowledge::default().encode_into(&mut dst).is_err());
        assert!(dst.is_empty());
    }

    #[test]
    fn count_larger_than_buffer() {
        // Claims two ids, carries one.
        let err = Acknowledge::decode(&[0x0A, 0x02, 0, 0, 0, 7]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::LengthMismatch {
                expected: 10,
                actual: 6,
                mode: LengthMode::Exact
            }
        ));
    }

    #[test]
    fn count_smaller_than_buffer() {
        let err = Acknowledge::decode(&[0x0A, 0x01, 0, 0, 0, 7, 0, 0, 0, 8]).unwrap_err();
        assert!(matches!(err, PacketError::LengthMismatch { .. }));
    }

    #[test]
    fn partial_id_bytes() {
        let err = Acknowledge::decode(&[0x0A, 0x01, 0, 0]).unwrap_err();
        assert!(matches!(err, PacketError::LengthMismatch { .. }));
    }

    #[test]
    fn missing_count_byte() {
        let err = Acknowledge::decode(&[0x0A]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::LengthMismatch {
                expected: 2,
                actual: 1,
                mode: LengthMode::AtLeast
            }
        ));
    }

    #[test]
    fn wrong_id() {
        let err = Acknowledge::decode(&[0x0B, 0x00]).unwrap_err();
        assert!(matches!(err, PacketError::IdMismatch { .. }));
    }

    #[test]
    fn batches_split_at_255() {
        let ids: Vec<u32> = (0..600).collect();
        let batches = Acknowledge::batches(&ids);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 255);
        assert_eq!(batches[1].len(), 255);
        assert_eq!(batches[2].len(), 90);
        assert!(batches.iter().all(|b| b.encode().is_ok()));

        let rejoined: Vec<u32> = batches.into_iter().flat_map(|b| b.sequence_ids).collect();
        assert_eq!(rejoined, ids);
    }

    #[test]
    fn batches_of_nothing() {
        assert!(Acknowledge::batches(&[]).is_empty());
    }
}
