//! Common value types for the campus SDN controller.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the southbound protocol model and the controller:
//!
//! - [`Ipv4Address`]: IPv4 host addresses
//! - [`Ipv4Prefix`]: IPv4 network prefixes (CIDR notation) with membership tests
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses

mod ip;
mod mac;

pub use ip::{Ipv4Address, Ipv4Prefix};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv4 prefix format: {0}")]
    InvalidIpPrefix(String),
}
