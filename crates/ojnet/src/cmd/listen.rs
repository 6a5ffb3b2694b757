use std::sync::atomic::Ordering;

use ojnet_packet::Packet;
use ojnet_peer::{ListenerConfig, PeerConfig, PeerListener};

use crate::cmd::{
    classify_recv_error, install_ctrlc_handler, ListenArgs, RecvErrorDisposition, POLL_INTERVAL,
};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut listener = PeerListener::bind(args.addr)
        .map_err(|err| peer_error("bind failed", err))?
        .with_config(ListenerConfig {
            peer: PeerConfig {
                recv_timeout: Some(POLL_INTERVAL),
                ..PeerConfig::default()
            },
            accept_timeout: Some(POLL_INTERVAL),
            ..ListenerConfig::default()
        });

    let running = install_ctrlc_handler()?;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut peer = match listener.accept() {
            Ok(peer) => peer,
            Err(err) => match classify_recv_error(err) {
                RecvErrorDisposition::Idle | RecvErrorDisposition::Break => continue,
                RecvErrorDisposition::Fatal(err) => return Err(peer_error("accept failed", err)),
            },
        };
        tracing::info!(peer_id = peer.id(), remote = %peer.remote_addr(), "peer connected");

        while running.load(Ordering::SeqCst) {
            let packet = match peer.recv() {
                Ok(packet) => packet,
                Err(err) => match classify_recv_error(err) {
                    RecvErrorDisposition::Idle => continue,
                    RecvErrorDisposition::Break => break,
                    RecvErrorDisposition::Fatal(err) => {
                        return Err(peer_error("receive failed", err))
                    }
                },
            };

            if !wanted(&packet, args.channels.as_deref()) {
                continue;
            }

            print_packet(&packet, Some(peer.id()), format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

/// The channel filter only applies to containers.
fn wanted(packet: &Packet, channels: Option<&[u8]>) -> bool {
    match (packet, channels) {
        (Packet::Container(container), Some(channels)) => channels.contains(&container.channel),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use ojnet_packet::{Acknowledge, Container};

    use super::*;

    #[test]
    fn channel_filter_only_applies_to_containers() {
        let on_two: Packet = Container::new(2, &b"x"[..]).into();
        let ack: Packet = Acknowledge::new(vec![1]).into();

        assert!(wanted(&on_two, None));
        assert!(wanted(&on_two, Some(&[1, 2])));
        assert!(!wanted(&on_two, Some(&[1])));
        assert!(wanted(&ack, Some(&[1])));
    }
}
