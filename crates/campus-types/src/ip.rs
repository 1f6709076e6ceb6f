//! IPv4 address and prefix types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address wrapper used for host identities and header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);
    pub const BROADCAST: Self = Ipv4Address(Ipv4Addr::BROADCAST);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    /// Builds an address from four bytes in network order.
    pub const fn from_octets(octets: [u8; 4]) -> Self {
        Ipv4Address(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns the host-order integer value of the address.
    pub const fn to_bits(&self) -> u32 {
        u32::from_be_bytes(self.0.octets())
    }

    /// Returns the low-order byte (`d` in `a.b.c.d`).
    pub const fn last_octet(&self) -> u8 {
        self.0.octets()[3]
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Ipv4Address::from_octets(octets)
    }
}

/// An IPv4 prefix in CIDR notation (e.g., 20.2.1.0/24).
///
/// Host bits in the stored address are kept as written; membership tests
/// only compare the first `prefix_len` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    address: Ipv4Address,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// Creates a new IPv4 prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(address: Ipv4Address, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum 32",
                prefix_len
            )));
        }

        Ok(Ipv4Prefix {
            address,
            prefix_len,
        })
    }

    /// Const constructor for prefixes fixed at compile time.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len` exceeds 32; in a `const` item that is a
    /// compile error.
    pub const fn new_const(address: Ipv4Address, prefix_len: u8) -> Self {
        assert!(prefix_len <= 32, "prefix length exceeds 32");
        Ipv4Prefix {
            address,
            prefix_len,
        }
    }

    /// Returns the address this prefix was written with.
    pub const fn address(&self) -> &Ipv4Address {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the network mask as a host-order integer.
    pub const fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - self.prefix_len)
        }
    }

    /// Returns the network address (host bits cleared).
    pub const fn network(&self) -> Ipv4Address {
        let bits = self.address.to_bits() & self.mask();
        Ipv4Address::from_octets(bits.to_be_bytes())
    }

    /// Returns true if `addr` lies within this prefix.
    pub const fn contains(&self, addr: &Ipv4Address) -> bool {
        let mask = self.mask();
        (self.address.to_bits() & mask) == (addr.to_bits() & mask)
    }

    /// Returns true if this is a host route (/32).
    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == 32
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: Ipv4Address = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Ipv4Prefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> Self {
        prefix.to_string()
    }
}
