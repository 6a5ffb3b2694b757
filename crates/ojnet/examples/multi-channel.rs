//! Multi-channel example: opens an application channel next to the
//! control channel and sends on both.
//!
//! Run with:
//!   cargo run --example multi-channel --features peer

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;

use ojnet::packet::{channel_name, Packet, CONTROL};
use ojnet::peer::{connect, PeerListener, SendOptions};

const STATE: u8 = 1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut listener = PeerListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    let addr = listener.local_addr()?;

    let server = thread::spawn(
        move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let mut peer = listener.accept()?;
            eprintln!("[server] peer connected: {}", peer.id());

            let mut echoed = 0;
            while echoed < 2 {
                match peer.recv()? {
                    Packet::Container(container) => {
                        eprintln!(
                            "[server] channel={} payload={}",
                            channel_name(container.channel),
                            String::from_utf8_lossy(&container.payload)
                        );
                        peer.send(container.channel, container.payload, SendOptions::default())?;
                        echoed += 1;
                    }
                    Packet::ChannelOperation(op) => {
                        eprintln!("[server] {} channel {}", op.operation, op.channel);
                    }
                    other => eprintln!("[server] ignoring {}", other.kind()),
                }
            }
            Ok(())
        },
    );

    let mut client = connect(addr)?;
    client.open_channel(STATE)?;

    client.send(CONTROL, &b"ping"[..], SendOptions::reliable())?;
    if let Packet::Container(resp) = client.recv()? {
        eprintln!(
            "[client] CONTROL response: {}",
            String::from_utf8_lossy(&resp.payload)
        );
    }

    client.send(STATE, &b"player moved"[..], SendOptions::reliable().ordered())?;
    if let Packet::Container(resp) = client.recv()? {
        eprintln!(
            "[client] STATE response: {}",
            String::from_utf8_lossy(&resp.payload)
        );
    }

    server
        .join()
        .expect("server thread should not panic")
        .expect("server should complete without error");
    Ok(())
}
