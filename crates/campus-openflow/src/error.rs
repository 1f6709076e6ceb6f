//! Packet decoding errors.
//!
//! A frame that fails to decode is never partially acted upon: the caller
//! logs the error and discards the event.

use thiserror::Error;

/// Result type for packet decoding.
pub type PacketResult<T> = Result<T, PacketError>;

/// Error type for header decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// A header extends past the end of the captured bytes.
    #[error("truncated {layer} header: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    /// The IPv4 version nibble is not 4.
    #[error("invalid IPv4 version: {0}")]
    InvalidIpVersion(u8),

    /// The IPv4 header length is shorter than the fixed header.
    #[error("invalid IPv4 header length: {0} words")]
    InvalidIpHeaderLength(u8),

    /// The IPv4 total length is shorter than its own header.
    #[error("invalid IPv4 total length {total} for header length {header}")]
    InvalidIpTotalLength { total: u16, header: usize },

    /// An ARP packet for something other than Ethernet/IPv4.
    #[error("unsupported ARP hardware type {hardware:#06x} / protocol type {protocol:#06x}")]
    UnsupportedArp { hardware: u16, protocol: u16 },

    /// The TCP data offset points inside the fixed header.
    #[error("invalid TCP data offset: {0} words")]
    InvalidTcpDataOffset(u8),
}

impl PacketError {
    pub(crate) fn truncated(layer: &'static str, needed: usize, available: usize) -> Self {
        PacketError::Truncated {
            layer,
            needed,
            available,
        }
    }

    /// Returns the protocol layer the error was raised in.
    pub fn layer(&self) -> &'static str {
        match self {
            PacketError::Truncated { layer, .. } => layer,
            PacketError::InvalidIpVersion(_)
            | PacketError::InvalidIpHeaderLength(_)
            | PacketError::InvalidIpTotalLength { .. } => "ipv4",
            PacketError::UnsupportedArp { .. } => "arp",
            PacketError::InvalidTcpDataOffset(_) => "tcp",
        }
    }
}
