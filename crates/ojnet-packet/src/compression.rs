//! Payload compression for containers with the `compressed` flag.
//!
//! The container codec only sees the [`Compressor`] trait. [`Lz4Compressor`]
//! is the implementation used unless a caller supplies another one.

use std::fmt;

use bytes::Bytes;

/// Default cap on the size of a decompressed payload: 1 MiB.
pub const DEFAULT_MAX_DECOMPRESSED: usize = 1024 * 1024;

/// Length of the little-endian size prefix written by `lz4_flex`.
const LZ4_SIZE_PREFIX: usize = 4;

/// Errors raised by a payload compressor.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// The compressed input is too short to be valid.
    #[error("compressed payload truncated ({0} bytes)")]
    Truncated(usize),

    /// The decompressed size would exceed the configured limit.
    #[error("decompressed size {size} exceeds limit {max}")]
    TooLarge { size: usize, max: usize },

    /// The compressed input is corrupt.
    #[error("decompression failed: {0}")]
    Corrupt(String),
}

/// Compress/decompress function pair applied to container payloads.
pub trait Compressor: Send + Sync {
    /// Compress a payload before it is length-prefixed.
    fn compress(&self, data: &[u8]) -> Result<Bytes, CompressionError>;

    /// Restore a payload received with the `compressed` flag.
    fn decompress(&self, data: &[u8]) -> Result<Bytes, CompressionError>;

    /// Algorithm name for diagnostics.
    fn name(&self) -> &'static str;
}

/// LZ4 block compression with a size prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz4Compressor {
    max_output: usize,
}

impl Lz4Compressor {
    /// Create a compressor with the default decompression limit.
    pub fn new() -> Self {
        Self::with_max_output(DEFAULT_MAX_DECOMPRESSED)
    }

    /// Create a compressor that refuses to decompress beyond `max_output` bytes.
    pub fn with_max_output(max_output: usize) -> Self {
        Self { max_output }
    }

    /// Decompression limit in bytes.
    pub fn max_output(&self) -> usize {
        self.max_output
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Bytes, CompressionError> {
        Ok(Bytes::from(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Bytes, CompressionError> {
        if data.len() < LZ4_SIZE_PREFIX {
            return Err(CompressionError::Truncated(data.len()));
        }

        // Check the claimed size before lz4_flex allocates for it.
        let claimed = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if claimed > self.max_output {
            return Err(CompressionError::TooLarge {
                size: claimed,
                max: self.max_output,
            });
        }

        lz4_flex::decompress_size_prepended(data)
            .map(Bytes::from)
            .map_err(|err| CompressionError::Corrupt(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}

impl fmt::Debug for dyn Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz4_roundtrip() {
        let data = b"ojnet payload ".repeat(64);
        let compressor = Lz4Compressor::new();

        let compressed = compressor.compress(&data).unwrap();
        assert!(compressed.len() < data.len());

        let restored = compressor.decompress(&compressed).unwrap();
        assert_eq!(restored.as_ref(), data.as_slice());
    }

    #[test]
    fn lz4_empty_payload() {
        let compressor = Lz4Compressor::new();
        let compressed = compressor.compress(b"").unwrap();
        let restored = compressor.decompress(&compressed).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn lz4_rejects_truncated_prefix() {
        let err = Lz4Compressor::new().decompress(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, CompressionError::Truncated(2)));
    }

    #[test]
    fn lz4_rejects_oversized_claim() {
        let compressor = Lz4Compressor::with_max_output(16);
        let compressed = Lz4Compressor::new().compress(&[7u8; 64]).unwrap();

        let err = compressor.decompress(&compressed).unwrap_err();
        assert!(matches!(err, CompressionError::TooLarge { size: 64, max: 16 }));
    }

    #[test]
    fn lz4_rejects_garbage() {
        let garbage = [0x10, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF];
        let err = Lz4Compressor::new().decompress(&garbage).unwrap_err();
        assert!(matches!(err, CompressionError::Corrupt(_)));
    }
}
