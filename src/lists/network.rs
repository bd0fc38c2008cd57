//! IPv4 networks in CIDR notation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::error::GuardError;

/// An IPv4 network, always normalized to its network address.
///
/// `192.168.1.17/16` parses to `192.168.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Net {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Net {
    /// Create a network from any address inside it and a prefix length.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, GuardError> {
        if prefix > 32 {
            return Err(GuardError::InvalidNetwork(format!(
                "prefix length {} is out of range",
                prefix
            )));
        }

        let network = Ipv4Addr::from(u32::from(addr) & mask(prefix));
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// First and last address of the network as integers.
    pub fn range(&self) -> (u32, u32) {
        let start = u32::from(self.network);
        (start, start | !mask(self.prefix))
    }

    /// Whether `addr` falls inside this network. IPv6 never matches.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => u32::from(v4) & mask(self.prefix) == u32::from(self.network),
            IpAddr::V6(_) => false,
        }
    }

    /// Whether every address of `other` is inside this network.
    pub fn covers(&self, other: &Ipv4Net) -> bool {
        let (start, end) = self.range();
        let (other_start, other_end) = other.range();
        start <= other_start && other_end <= end
    }
}

fn mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

impl FromStr for Ipv4Net {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GuardError::InvalidNetwork(format!("'{}' is not an IPv4 network in CIDR notation", s));

        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

        Self::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
