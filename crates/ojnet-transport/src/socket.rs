use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP header - 20 byte IP header).
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// A UDP socket that sends and receives whole datagrams.
///
/// A socket created with [`DatagramSocket::connect`] has a fixed peer and
/// only receives datagrams from it. A socket created with
/// [`DatagramSocket::bind`] talks to any address via `send_to`/`recv_from`.
#[derive(Debug)]
pub struct DatagramSocket {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl DatagramSocket {
    /// Bind to a local address.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local = socket.local_addr()?;
        info!(%local, "bound udp socket");
        Ok(Self { socket, peer: None })
    }

    /// Bind an ephemeral local port and connect it to `remote`.
    pub fn connect(remote: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match remote {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        socket
            .connect(remote)
            .map_err(|source| TransportError::Connect {
                addr: remote,
                source,
            })?;
        debug!(%remote, local = ?socket.local_addr().ok(), "connected udp socket");
        Ok(Self {
            socket,
            peer: Some(remote),
        })
    }

    /// Connect an already bound socket to `remote`, replacing any previous peer.
    pub fn set_peer(&mut self, remote: SocketAddr) -> Result<()> {
        self.socket
            .connect(remote)
            .map_err(|source| TransportError::Connect {
                addr: remote,
                source,
            })?;
        debug!(%remote, "udp socket peer set");
        self.peer = Some(remote);
        Ok(())
    }

    /// Send one datagram to the connected peer.
    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        check_size(datagram)?;
        let sent = self.socket.send(datagram)?;
        check_sent(sent, datagram.len())
    }

    /// Send one datagram to `target`.
    pub fn send_to(&self, datagram: &[u8], target: SocketAddr) -> Result<()> {
        check_size(datagram)?;
        let sent = self.socket.send_to(datagram, target)?;
        check_sent(sent, datagram.len())
    }

    /// Receive one datagram from the connected peer (blocking).
    ///
    /// `buf` should be [`MAX_DATAGRAM_SIZE`] bytes; a longer datagram is truncated by the OS.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(self.socket.recv(buf)?)
    }

    /// Receive one datagram from any sender (blocking).
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf)?)
    }

    /// Set read timeout. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout. `None` blocks indefinitely.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this socket (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            peer: self.peer,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

fn check_size(datagram: &[u8]) -> Result<()> {
    if datagram.len() > MAX_DATAGRAM_SIZE {
        return Err(TransportError::DatagramTooLarge {
            size: datagram.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(())
}

fn check_sent(sent: usize, expected: usize) -> Result<()> {
    if sent != expected {
        return Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!("short datagram write ({sent} of {expected} bytes)"),
        )));
    }
    Ok(())
}
