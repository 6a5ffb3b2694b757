//! Big-endian integer writers.
//!
//! Every multi-byte field in every packet goes through these, so the wire
//! byte order is network order everywhere.

use bytes::BufMut;

/// Append `value` as 2 big-endian bytes.
pub fn write_u16<B: BufMut>(dst: &mut B, value: u16) {
    dst.put_u16(value);
}

/// Append `value` as 4 big-endian bytes.
pub fn write_u32<B: BufMut>(dst: &mut B, value: u32) {
    dst.put_u32(value);
}

/// Append `value` as 8 big-endian bytes.
pub fn write_u64<B: BufMut>(dst: &mut B, value: u64) {
    dst.put_u64(value);
}
