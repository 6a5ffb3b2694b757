use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::compression::{Compressor, Lz4Compressor, DEFAULT_MAX_DECOMPRESSED};
use crate::error::Result;
use crate::packet::{peek_kind, Packet};

/// Configuration for the packet codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest decompressed container payload accepted. Default: 1 MiB.
    pub max_decompressed_payload: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_decompressed_payload: DEFAULT_MAX_DECOMPRESSED,
        }
    }
}

/// Datagram-level codec: one encoded packet per datagram.
///
/// Cheap to clone; clones share the compressor.
#[derive(Clone)]
pub struct PacketCodec {
    config: CodecConfig,
    compressor: Arc<dyn Compressor>,
}

impl PacketCodec {
    /// Codec with default configuration and LZ4 payload compression.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Codec with explicit configuration and LZ4 payload compression.
    pub fn with_config(config: CodecConfig) -> Self {
        let compressor = Arc::new(Lz4Compressor::with_max_output(
            config.max_decompressed_payload,
        ));
        Self { config, compressor }
    }

    /// Replace the payload compressor.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Encode a packet into a fresh datagram.
    pub fn encode_packet(&self, packet: &Packet) -> Result<Bytes> {
        packet.encode_with(self.compressor.as_ref())
    }

    /// Append an encoded packet to `dst`.
    pub fn encode_packet_into(&self, packet: &Packet, dst: &mut BytesMut) -> Result<()> {
        packet.encode_into_with(dst, self.compressor.as_ref())
    }

    /// Decode one datagram.
    ///
    /// A failure means the datagram should be discarded.
    pub fn decode_datagram(&self, datagram: &[u8]) -> Result<Packet> {
        let result = peek_kind(datagram).and_then(|kind| {
            Packet::decode_as_with(kind, datagram, self.compressor.as_ref())
        });

        match &result {
            Ok(packet) => trace!(kind = %packet.kind(), len = datagram.len(), "decoded packet"),
            Err(err) => debug!(
                len = datagram.len(),
                first_byte = datagram.first().copied(),
                error = %err,
                "malformed datagram"
            ),
        }
        result
    }

    /// Current codec configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketCodec")
            .field("config", &self.config)
            .field("compressor", &self.compressor.name())
            .finish()
    }
}

/// `tokio_util` codec impls for use with `tokio_util::udp::UdpFramed`.
///
/// `UdpFramed` hands the decoder one whole datagram at a time, so the decoder
/// always consumes the entire buffer.
#[cfg(feature = "async")]
mod framed {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::PacketCodec;
    use crate::error::PacketError;
    use crate::packet::Packet;

    impl Decoder for PacketCodec {
        type Item = Packet;
        type Error = PacketError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, PacketError> {
            if src.is_empty() {
                return Ok(None);
            }
            let datagram = src.split();
            self.decode_datagram(&datagram).map(Some)
        }
    }

    impl Encoder<Packet> for PacketCodec {
        type Error = PacketError;

        fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), PacketError> {
            self.encode_packet_into(&item, dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionError;
    use crate::error::PacketError;
    use crate::packet::{Acknowledge, ConnectionRequest, Container};

    #[test]
    fn encode_decode_roundtrip() {
        let codec = PacketCodec::new();
        let packet: Packet = ConnectionRequest::new(99).into();

        let wire = codec.encode_packet(&packet).unwrap();
        assert_eq!(codec.decode_datagram(&wire).unwrap(), packet);
    }

    #[test]
    fn encode_into_appends() {
        let codec = PacketCodec::new();
        let mut dst = BytesMut::from(&b"xx"[..]);
        codec
            .encode_packet_into(&Acknowledge::new(vec![1]).into(), &mut dst)
            .unwrap();
        assert_eq!(dst.as_ref(), &[b'x', b'x', 0x0A, 0x01, 0, 0, 0, 1]);
    }

    #[test]
    fn decompression_limit_from_config() {
        let codec = PacketCodec::with_config(CodecConfig {
            max_decompressed_payload: 32,
        });
        let packet: Packet = Container::new(1, vec![1u8; 64]).with_compression().into();
        let wire = PacketCodec::new().encode_packet(&packet).unwrap();

        let err = codec.decode_datagram(&wire).unwrap_err();
        assert!(matches!(
            err,
            PacketError::PayloadTooLarge { size: 64, max: 32 }
        ));
    }

    #[test]
    fn custom_compressor_is_used() {
        #[derive(Debug)]
        struct Identity;

        impl Compressor for Identity {
            fn compress(&self, data: &[u8]) -> std::result::Result<Bytes, CompressionError> {
                Ok(Bytes::copy_from_slice(data))
            }

            fn decompress(&self, data: &[u8]) -> std::result::Result<Bytes, CompressionError> {
                Ok(Bytes::copy_from_slice(data))
            }

            fn name(&self) -> &'static str {
                "identity"
            }
        }

        let codec = PacketCodec::new().with_compressor(Arc::new(Identity));
        let packet: Packet = Container::new(1, &b"raw"[..]).with_compression().into();
        let wire = codec.encode_packet(&packet).unwrap();

        assert_eq!(&wire[5..], b"raw");
        assert_eq!(codec.decode_datagram(&wire).unwrap(), packet);
        assert!(format!("{codec:?}").contains("identity"));
    }

    #[test]
    fn malformed_datagram_is_error() {
        let codec = PacketCodec::new();
        assert!(codec.decode_datagram(&[]).is_err());
        assert!(codec.decode_datagram(&[0x07]).is_err());
        assert!(codec.decode_datagram(&[0x01, 0x00]).is_err());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn udp_framed_roundtrip() {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::UdpSocket;
        use tokio_util::udp::UdpFramed;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let mut sender = UdpFramed::new(a, PacketCodec::new());
        let mut receiver = UdpFramed::new(b, PacketCodec::new());

        let packet: Packet = Container::new(2, &b"async"[..])
            .with_sequence_id(5)
            .into();
        sender.send((packet.clone(), b_addr)).await.unwrap();

        let (received, _from) = receiver.next().await.unwrap().unwrap();
        assert_eq!(received, packet);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn udp_framed_survives_malformed_datagram() {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::UdpSocket;
        use tokio_util::udp::UdpFramed;

        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b_addr = b.local_addr().unwrap();
        let mut receiver = UdpFramed::new(b, PacketCodec::new());

        raw.send_to(&[0x0C, 0x00], b_addr).await.unwrap();
        let mut sender = UdpFramed::new(raw, PacketCodec::new());
        let packet: Packet = Acknowledge::new(vec![3]).into();
        sender.send((packet.clone(), b_addr)).await.unwrap();

        assert!(receiver.next().await.unwrap().is_err());
        let (received, _) = receiver.next().await.unwrap().unwrap();
        assert_eq!(received, packet);
    }
}
