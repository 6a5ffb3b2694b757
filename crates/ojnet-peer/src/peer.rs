use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ojnet_packet::{
    Acknowledge, ChannelOperation, CodecConfig, Container, Operation, Packet, PacketCodec, CONTROL,
};
use ojnet_transport::{DatagramSocket, MAX_DATAGRAM_SIZE};
use tracing::{debug, info, trace};

use crate::error::{PeerError, Result};

/// Runtime behavior for a connected peer.
#[derive(Debug, Clone, Default)]
pub struct PeerConfig {
    /// Codec limits applied to every datagram.
    pub codec: CodecConfig,
    /// Timeout for `recv`. `None` blocks indefinitely.
    pub recv_timeout: Option<Duration>,
}

/// Delivery flags for [`Peer::send`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Assign a sequence id so the receiver can acknowledge it.
    pub reliable: bool,
    /// Assign a per-channel ordered id.
    pub ordered: bool,
    /// Compress the payload.
    pub compressed: bool,
}

impl SendOptions {
    pub fn reliable() -> Self {
        Self {
            reliable: true,
            ..Self::default()
        }
    }

    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }
}

/// One end of an established connection.
///
/// Owns a UDP socket connected to the remote end. Channel 0 is always open;
/// other channels are opened and closed with channel operations from either
/// side. Closing channel 0 ends the connection.
pub struct Peer {
    id: u64,
    socket: DatagramSocket,
    remote: SocketAddr,
    codec: PacketCodec,
    config: PeerConfig,
    open_channels: BTreeSet<u8>,
    next_sequence_id: u32,
    next_ordered_ids: HashMap<u8, u16>,
    closed: bool,
    recv_buf: Vec<u8>,
    // Keeps the listener's connection slot alive.
    _slot: Option<Arc<()>>,
}

impl Peer {
    pub(crate) fn from_parts(
        id: u64,
        socket: DatagramSocket,
        remote: SocketAddr,
        config: PeerConfig,
        slot: Option<Arc<()>>,
    ) -> Result<Self> {
        socket.set_read_timeout(config.recv_timeout)?;
        Ok(Self {
            id,
            socket,
            remote,
            codec: PacketCodec::with_config(config.codec.clone()),
            config,
            open_channels: BTreeSet::from([CONTROL]),
            next_sequence_id: 0,
            next_ordered_ids: HashMap::new(),
            closed: false,
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
            _slot: slot,
        })
    }

    /// Server-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address of the remote end.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Returns true if `channel` is open.
    pub fn is_open(&self, channel: u8) -> bool {
        self.open_channels.contains(&channel)
    }

    /// Open channels in ascending order, including channel 0.
    pub fn open_channels(&self) -> Vec<u8> {
        self.open_channels.iter().copied().collect()
    }

    /// Returns true once either side has closed channel 0.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sequence id the next reliable send will use.
    pub fn next_sequence_id(&self) -> u32 {
        self.next_sequence_id
    }

    /// Ordered id the next ordered send on `channel` will use.
    pub fn next_ordered_id(&self, channel: u8) -> u16 {
        self.next_ordered_ids.get(&channel).copied().unwrap_or(0)
    }

    /// Change the receive timeout.
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout)?;
        self.config.recv_timeout = timeout;
        Ok(())
    }

    /// Send `payload` on `channel` and return the container that went out.
    ///
    /// Ids are only consumed once the datagram has been sent.
    pub fn send(
        &mut self,
        channel: u8,
        payload: impl Into<Bytes>,
        options: SendOptions,
    ) -> Result<Container> {
        self.ensure_connected()?;
        if !self.is_open(channel) {
            return Err(PeerError::ChannelClosed(channel));
        }

        let mut container = Container::new(channel, payload);
        if options.reliable {
            container = container.with_sequence_id(self.next_sequence_id);
        }
        if options.ordered {
            container = container.with_ordered_id(self.next_ordered_id(channel));
        }
        if options.compressed {
            container = container.with_compression();
        }

        self.send_packet(&Packet::Container(container.clone()))?;

        if options.reliable {
            self.next_sequence_id = self.next_sequence_id.wrapping_add(1);
        }
        if options.ordered {
            let next = self.next_ordered_ids.entry(channel).or_insert(0);
            *next = next.wrapping_add(1);
        }
        Ok(container)
    }

    /// Acknowledge received sequence ids, splitting into as many packets as needed.
    ///
    /// Returns the number of packets sent.
    pub fn acknowledge(&mut self, sequence_ids: &[u32]) -> Result<usize> {
        self.ensure_connected()?;
        let batches = Acknowledge::batches(sequence_ids);
        for batch in &batches {
            self.send_packet(&Packet::Acknowledge(batch.clone()))?;
        }
        Ok(batches.len())
    }

    /// Open `channel` on both ends.
    pub fn open_channel(&mut self, channel: u8) -> Result<()> {
        self.channel_operation(ChannelOperation::open(channel))
    }

    /// Close `channel` on both ends. Closing channel 0 closes the connection.
    pub fn close_channel(&mut self, channel: u8) -> Result<()> {
        self.channel_operation(ChannelOperation::close(channel))
    }

    /// Restart ordered ids on `channel` from zero on both ends.
    pub fn reset_ordered_ids(&mut self, channel: u8) -> Result<()> {
        self.channel_operation(ChannelOperation::reset_ordered_ids(channel))
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.channel_operation(ChannelOperation::disconnect())
    }

    /// Receive the next packet from the remote end.
    ///
    /// Malformed datagrams, handshake packets, and containers on channels
    /// that are not open are discarded. Channel operations are applied before
    /// being returned. Returns `Disconnected` once channel 0 is closed.
    pub fn recv(&mut self) -> Result<Packet> {
        loop {
            self.ensure_connected()?;

            let len = match self.socket.recv(&mut self.recv_buf) {
                Ok(len) => len,
                Err(err) if err.is_timeout() => {
                    return Err(PeerError::Timeout(
                        self.config.recv_timeout.unwrap_or_default(),
                    ));
                }
                Err(err) => return Err(err.into()),
            };

            let packet = match self.codec.decode_datagram(&self.recv_buf[..len]) {
                Ok(packet) => packet,
                Err(_) => continue,
            };

            match &packet {
                Packet::ChannelOperation(op) => {
                    self.apply(*op);
                    if self.closed {
                        info!(peer_id = self.id, remote = %self.remote, "remote closed connection");
                        return Err(PeerError::Disconnected(
                            "remote closed control channel".to_string(),
                        ));
                    }
                }
                Packet::Container(container) if !self.is_open(container.channel) => {
                    debug!(
                        channel = container.channel,
                        "discarding container on closed channel"
                    );
                    continue;
                }
                Packet::ConnectionRequest(_)
                | Packet::ConnectionAccepted(_)
                | Packet::ConnectionRejected(_) => {
                    debug!(kind = %packet.kind(), "discarding handshake packet on established connection");
                    continue;
                }
                _ => {}
            }
            return Ok(packet);
        }
    }

    fn channel_operation(&mut self, op: ChannelOperation) -> Result<()> {
        self.ensure_connected()?;
        self.send_packet(&op.into())?;
        self.apply(op);
        Ok(())
    }

    fn apply(&mut self, op: ChannelOperation) {
        trace!(peer_id = self.id, operation = %op.operation, channel = op.channel, "channel operation");
        match op.operation {
            Operation::OpenChannel => {
                self.open_channels.insert(op.channel);
            }
            Operation::CloseChannel if op.is_disconnect() => {
                self.closed = true;
            }
            Operation::CloseChannel => {
                self.open_channels.remove(&op.channel);
                self.next_ordered_ids.remove(&op.channel);
            }
            Operation::ResetOrderedIds => {
                self.next_ordered_ids.remove(&op.channel);
            }
        }
    }

    fn send_packet(&self, packet: &Packet) -> Result<()> {
        let wire = self.codec.encode_packet(packet)?;
        self.socket.send(&wire)?;
        trace!(peer_id = self.id, kind = %packet.kind(), len = wire.len(), "sent packet");
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.closed {
            return Err(PeerError::Disconnected("connection closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                debug!(peer_id = self.id, error = %err, "failed to send close on drop");
            }
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("open_channels", &self.open_channels)
            .field("next_sequence_id", &self.next_sequence_id)
            .field("closed", &self.closed)
            .finish()
    }
}
