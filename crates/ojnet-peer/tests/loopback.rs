//! End-to-end sessions over loopback UDP.

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

use ojnet_packet::{ChannelOperation, Packet, CONTROL};
use ojnet_peer::{
    connect_with_config, HandshakeConfig, ListenerConfig, PeerConfig, PeerError, PeerListener,
    SendOptions,
};

const GAME: u8 = 1;

fn listener() -> (PeerListener, SocketAddr) {
    let listener = PeerListener::bind((Ipv4Addr::LOCALHOST, 0).into())
        .expect("listener should bind")
        .with_config(ListenerConfig {
            peer: PeerConfig {
                recv_timeout: Some(Duration::from_secs(2)),
                ..PeerConfig::default()
            },
            accept_timeout: Some(Duration::from_secs(5)),
            ..ListenerConfig::default()
        });
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn client_configs() -> (HandshakeConfig, Option<PeerConfig>) {
    let handshake = HandshakeConfig {
        timeout: Duration::from_millis(200),
        attempts: 10,
        ..HandshakeConfig::default()
    };
    let peer = PeerConfig {
        recv_timeout: Some(Duration::from_secs(2)),
        ..PeerConfig::default()
    };
    (handshake, Some(peer))
}

#[test]
fn reliable_ordered_session_with_acks() {
    let (mut listener, addr) = listener();

    let server = thread::spawn(move || {
        let mut peer = listener.accept().expect("accept");
        let mut received = Vec::new();

        loop {
            match peer.recv() {
                Ok(Packet::Container(container)) => {
                    if let Some(id) = container.sequence_id {
                        peer.acknowledge(&[id]).expect("ack");
                    }
                    received.push(container);
                }
                Ok(Packet::ChannelOperation(_)) => {}
                Ok(other) => panic!("unexpected packet {other:?}"),
                Err(PeerError::Disconnected(_)) => break,
                Err(err) => panic!("server recv failed: {err}"),
            }
        }
        (received, peer.open_channels())
    });

    let (handshake, peer_config) = client_configs();
    let mut client = connect_with_config(addr, &handshake, peer_config).expect("connect");

    assert!(matches!(
        client.send(GAME, &b"too early"[..], SendOptions::default()),
        Err(PeerError::ChannelClosed(GAME))
    ));
    client.open_channel(GAME).unwrap();

    let options = SendOptions::reliable().ordered();
    for payload in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        let sent = client.send(GAME, payload, options).unwrap();
        let Packet::Acknowledge(ack) = client.recv().expect("ack") else {
            panic!("expected acknowledge");
        };
        assert_eq!(ack.sequence_ids, vec![sent.sequence_id.unwrap()]);
    }
    client.close().unwrap();

    let (received, open) = server.join().expect("server thread");
    let payloads: Vec<&[u8]> = received.iter().map(|c| c.payload.as_ref()).collect();
    assert_eq!(payloads, vec![&b"one"[..], &b"two"[..], &b"three"[..]]);
    let sequence: Vec<_> = received.iter().map(|c| c.sequence_id).collect();
    assert_eq!(sequence, vec![Some(0), Some(1), Some(2)]);
    let ordered: Vec<_> = received.iter().map(|c| c.ordered_id).collect();
    assert_eq!(ordered, vec![Some(0), Some(1), Some(2)]);
    assert_eq!(open, vec![CONTROL, GAME]);
}

#[test]
fn closing_a_channel_drops_its_traffic() {
    let (mut listener, addr) = listener();

    let server = thread::spawn(move || {
        let mut peer = listener.accept().expect("accept");
        peer.open_channel(GAME).unwrap();
        peer.send(GAME, &b"first"[..], SendOptions::default()).unwrap();
        // Wait for the client to close the channel.
        let op = peer.recv().expect("close op");
        assert_eq!(op, Packet::from(ChannelOperation::close(GAME)));
        assert!(matches!(
            peer.send(GAME, &b"second"[..], SendOptions::default()),
            Err(PeerError::ChannelClosed(GAME))
        ));
        peer.send(CONTROL, &b"bye"[..], SendOptions::default()).unwrap();
    });

    let (handshake, peer_config) = client_configs();
    let mut client = connect_with_config(addr, &handshake, peer_config).expect("connect");

    assert_eq!(
        client.recv().unwrap(),
        Packet::from(ChannelOperation::open(GAME))
    );
    assert!(client.is_open(GAME));
    let Packet::Container(first) = client.recv().unwrap() else {
        panic!("expected container");
    };
    assert_eq!(first.payload.as_ref(), b"first");

    client.close_channel(GAME).unwrap();
    let Packet::Container(bye) = client.recv().unwrap() else {
        panic!("expected container");
    };
    assert_eq!(bye.channel, CONTROL);

    server.join().expect("server thread");
    // Server peer dropped, which closes the connection.
    assert!(matches!(client.recv(), Err(PeerError::Disconnected(_))));
}

#[test]
fn compressed_payloads_cross_the_wire() {
    let (mut listener, addr) = listener();

    let server = thread::spawn(move || {
        let mut peer = listener.accept().expect("accept");
        match peer.recv().expect("container") {
            Packet::Container(container) => container,
            other => panic!("unexpected packet {other:?}"),
        }
    });

    let (handshake, peer_config) = client_configs();
    let mut client = connect_with_config(addr, &handshake, peer_config).expect("connect");
    let payload = b"state ".repeat(2000);
    client
        .send(CONTROL, payload.clone(), SendOptions::default().compressed())
        .unwrap();

    let received = server.join().expect("server thread");
    assert!(received.compressed);
    assert_eq!(received.payload.as_ref(), payload.as_slice());
}
