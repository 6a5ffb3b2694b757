use ojnet_packet::Packet;
use ojnet_peer::{connect_with_config, HandshakeConfig, Peer, PeerConfig, PeerError, SendOptions};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    if args.attempts == 0 {
        return Err(CliError::new(USAGE, "--attempts must be at least 1"));
    }
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let handshake = HandshakeConfig {
        timeout: parse_duration(&args.connect_timeout)?,
        attempts: args.attempts,
        ..HandshakeConfig::default()
    };
    let peer_config = PeerConfig {
        recv_timeout: Some(wait_timeout),
        ..PeerConfig::default()
    };
    let payload = args.payload.resolve()?;

    let mut peer = connect_with_config(args.addr, &handshake, Some(peer_config))
        .map_err(|err| peer_error("connect failed", err))?;

    if !peer.is_open(args.channel) {
        peer.open_channel(args.channel)
            .map_err(|err| peer_error("open channel failed", err))?;
    }

    let options = SendOptions {
        reliable: args.reliable,
        ordered: args.ordered,
        compressed: args.compressed,
    };
    let sent = peer
        .send(args.channel, payload, options)
        .map_err(|err| peer_error("send failed", err))?;
    tracing::info!(
        channel = sent.channel,
        sequence_id = sent.sequence_id,
        ordered_id = sent.ordered_id,
        size = sent.payload.len(),
        "sent container"
    );

    if args.wait {
        let reply = wait_for_reply(&mut peer, args.channel)
            .map_err(|err| peer_error("receive failed", err))?;
        print_packet(&reply, Some(peer.id()), format);
    }

    peer.close().map_err(|err| peer_error("close failed", err))?;
    Ok(SUCCESS)
}

trait PacketSource {
    fn next_packet(&mut self) -> Result<Packet, PeerError>;
}

impl PacketSource for Peer {
    fn next_packet(&mut self) -> Result<Packet, PeerError> {
        self.recv()
    }
}

/// Wait for the first container on `channel`, skipping acknowledgements and
/// channel bookkeeping along the way.
fn wait_for_reply<S: PacketSource>(source: &mut S, channel: u8) -> Result<Packet, PeerError> {
    loop {
        match source.next_packet()? {
            Packet::Container(container) if container.channel == channel => {
                return Ok(Packet::Container(container));
            }
            Packet::Acknowledge(ack) => {
                tracing::debug!(sequence_ids = ?ack.sequence_ids, "acknowledged");
            }
            other => {
                tracing::debug!(kind = %other.kind(), "skipping while waiting for reply");
            }
        }
    }
}
