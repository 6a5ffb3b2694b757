//! The packet kind registry.
//!
//! Ids `0x04..=0x09` are reserved for future kinds. Decoders reject any id
//! that is not registered here.

use std::fmt;

use crate::error::PacketError;
use crate::packet::{
    Acknowledge, ChannelOperation, ConnectionAccepted, ConnectionRejected, ConnectionRequest,
    Container,
};

/// Wire protocol version carried in `ConnectionRequest`.
pub const PROTOCOL_VERSION: u8 = 0;

/// One-byte identifier at the start of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketKind {
    ConnectionRequest = 0x01,
    ConnectionAccepted = 0x02,
    ConnectionRejected = 0x03,
    Acknowledge = 0x0A,
    ChannelOperation = 0x0B,
    Container = 0x0C,
}

impl PacketKind {
    /// Every registered kind, in id order.
    pub const ALL: [PacketKind; 6] = [
        PacketKind::ConnectionRequest,
        PacketKind::ConnectionAccepted,
        PacketKind::ConnectionRejected,
        PacketKind::Acknowledge,
        PacketKind::ChannelOperation,
        PacketKind::Container,
    ];

    /// The wire id byte.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::ConnectionRequest => "ConnectionRequest",
            PacketKind::ConnectionAccepted => "ConnectionAccepted",
            PacketKind::ConnectionRejected => "ConnectionRejected",
            PacketKind::Acknowledge => "Acknowledge",
            PacketKind::ChannelOperation => "ChannelOperation",
            PacketKind::Container => "Container",
        }
    }

    /// Smallest valid encoded size, id byte included.
    ///
    /// For fixed-size kinds this is also the only valid size.
    pub const fn min_len(self) -> usize {
        match self {
            PacketKind::ConnectionRequest => ConnectionRequest::LEN,
            PacketKind::ConnectionAccepted => ConnectionAccepted::LEN,
            PacketKind::ConnectionRejected => ConnectionRejected::LEN,
            PacketKind::Acknowledge => Acknowledge::BASE_LEN,
            PacketKind::ChannelOperation => ChannelOperation::LEN,
            PacketKind::Container => Container::BASE_LEN,
        }
    }

    /// Returns true if every packet of this kind has the same size.
    pub const fn is_fixed_size(self) -> bool {
        !matches!(self, PacketKind::Acknowledge | PacketKind::Container)
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = PacketError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0x01 => Ok(PacketKind::ConnectionRequest),
            0x02 => Ok(PacketKind::ConnectionAccepted),
            0x03 => Ok(PacketKind::ConnectionRejected),
            0x0A => Ok(PacketKind::Acknowledge),
            0x0B => Ok(PacketKind::ChannelOperation),
            0x0C => Ok(PacketKind::Container),
            other => Err(PacketError::UnknownKind(other)),
        }
    }
}

impl From<PacketKind> for u8 {
    fn from(kind: PacketKind) -> Self {
        kind.id()
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.id())
    }
}

/// Returns true if the id lies in the range held back for future kinds.
pub fn is_reserved(id: u8) -> bool {
    (0x04..=0x09).contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_registry() {
        assert_eq!(PacketKind::ConnectionRequest.id(), 0x01);
        assert_eq!(PacketKind::ConnectionAccepted.id(), 0x02);
        assert_eq!(PacketKind::ConnectionRejected.id(), 0x03);
        assert_eq!(PacketKind::Acknowledge.id(), 0x0A);
        assert_eq!(PacketKind::ChannelOperation.id(), 0x0B);
        assert_eq!(PacketKind::Container.id(), 0x0C);
    }

    #[test]
    fn lookup_by_id() {
        for kind in PacketKind::ALL {
            assert_eq!(PacketKind::try_from(kind.id()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_and_reserved_ids_rejected() {
        for id in [0x00, 0x04, 0x09, 0x0D, 0xFF] {
            let err = PacketKind::try_from(id).unwrap_err();
            assert!(matches!(err, PacketError::UnknownKind(got) if got == id));
        }
        assert!(is_reserved(0x04));
        assert!(is_reserved(0x09));
        assert!(!is_reserved(0x0A));
    }

    #[test]
    fn min_lengths() {
        assert_eq!(PacketKind::ConnectionRequest.min_len(), 10);
        assert_eq!(PacketKind::ConnectionAccepted.min_len(), 9);
        assert_eq!(PacketKind::ConnectionRejected.min_len(), 2);
        assert_eq!(PacketKind::Acknowledge.min_len(), 2);
        assert_eq!(PacketKind::ChannelOperation.min_len(), 3);
        assert_eq!(PacketKind::Container.min_len(), 5);
        assert!(!PacketKind::Container.is_fixed_size());
        assert!(PacketKind::ConnectionRejected.is_fixed_size());
    }

    #[test]
    fn display_includes_id() {
        assert_eq!(PacketKind::Container.to_string(), "Container (0x0c)");
    }
}
