use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ojnet_packet::Packet;
use ojnet_peer::{
    AdmissionPolicy, ListenerConfig, Peer, PeerConfig, PeerError, PeerListener, SendOptions,
};

use crate::cmd::{
    classify_recv_error, install_ctrlc_handler, EchoArgs, RecvErrorDisposition, POLL_INTERVAL,
};
use crate::exit::{peer_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let mut listener = PeerListener::bind(args.addr)
        .map_err(|err| peer_error("bind failed", err))?
        .with_config(ListenerConfig {
            admission: AdmissionPolicy {
                max_connections: args.max_connections,
                ..AdmissionPolicy::default()
            },
            peer: PeerConfig {
                recv_timeout: Some(POLL_INTERVAL),
                ..PeerConfig::default()
            },
            accept_timeout: Some(POLL_INTERVAL),
        });

    let running = install_ctrlc_handler()?;
    let mut sessions = Vec::new();

    while running.load(Ordering::SeqCst) {
        let peer = match listener.accept() {
            Ok(peer) => peer,
            Err(err) => match classify_recv_error(err) {
                RecvErrorDisposition::Idle | RecvErrorDisposition::Break => continue,
                RecvErrorDisposition::Fatal(err) => return Err(peer_error("accept failed", err)),
            },
        };

        let channels = args.channels.clone();
        let running = running.clone();
        sessions = reap_finished(sessions);
        sessions.push(thread::spawn(move || {
            let peer_id = peer.id();
            if let Err(err) = serve(peer, channels.as_deref(), &running) {
                tracing::warn!(peer_id, error = %err, "echo session failed");
            }
        }));
    }

    for session in sessions {
        join_session(session);
    }
    Ok(SUCCESS)
}

/// Join sessions that have ended and keep the rest.
fn reap_finished(sessions: Vec<thread::JoinHandle<()>>) -> Vec<thread::JoinHandle<()>> {
    let (finished, running): (Vec<_>, Vec<_>) =
        sessions.into_iter().partition(|session| session.is_finished());
    for session in finished {
        join_session(session);
    }
    running
}

/// Returns false if the session thread panicked.
fn join_session(session: thread::JoinHandle<()>) -> bool {
    match session.join() {
        Ok(()) => true,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|text| text.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(panic = %message, "echo session panicked");
            false
        }
    }
}

fn serve(mut peer: Peer, channels: Option<&[u8]>, running: &AtomicBool) -> Result<(), PeerError> {
    tracing::info!(peer_id = peer.id(), remote = %peer.remote_addr(), "peer connected");

    while running.load(Ordering::SeqCst) {
        let packet = match peer.recv() {
            Ok(packet) => packet,
            Err(err) => match classify_recv_error(err) {
                RecvErrorDisposition::Idle => continue,
                RecvErrorDisposition::Break => {
                    tracing::info!(peer_id = peer.id(), "peer disconnected");
                    return Ok(());
                }
                RecvErrorDisposition::Fatal(err) => return Err(err),
            },
        };

        let Packet::Container(container) = packet else {
            continue;
        };
        if let Some(sequence_id) = container.sequence_id {
            peer.acknowledge(&[sequence_id])?;
        }
        if let Some(channels) = channels {
            if !channels.contains(&container.channel) {
                continue;
            }
        }

        tracing::info!(
            peer_id = peer.id(),
            channel = container.channel,
            size = container.payload.len(),
            "echoing container"
        );
        let options = SendOptions {
            reliable: container.is_reliable(),
            ordered: container.is_ordered(),
            compressed: container.compressed,
        };
        peer.send(container.channel, container.payload, options)?;
    }

    peer.close()
}
