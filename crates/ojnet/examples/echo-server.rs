//! Minimal echo server: accepts one peer and echoes containers back.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7777 \
//!     --channel 0 --data hello --reliable --wait --wait-timeout 3s

use std::net::{Ipv4Addr, SocketAddr};

use ojnet::packet::Packet;
use ojnet::peer::{PeerListener, SendOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 7777));
    let mut listener = PeerListener::bind(addr)?;
    eprintln!("Listening on {}", listener.local_addr()?);

    let mut peer = listener.accept()?;
    eprintln!("Peer connected: {} from {}", peer.id(), peer.remote_addr());

    loop {
        match peer.recv() {
            Ok(Packet::Container(container)) => {
                eprintln!(
                    "Received {} bytes on channel {}",
                    container.payload.len(),
                    container.channel
                );
                if let Some(id) = container.sequence_id {
                    peer.acknowledge(&[id])?;
                }
                let options = SendOptions {
                    reliable: container.sequence_id.is_some(),
                    ordered: container.ordered_id.is_some(),
                    compressed: container.compressed,
                };
                peer.send(container.channel, container.payload, options)?;
            }
            Ok(other) => eprintln!("Received {}", other.kind()),
            Err(e) => {
                eprintln!("Peer disconnected: {e}");
                break;
            }
        }
    }

    Ok(())
}
