//! IPv4 addresses and wildcard ranges.
//!
//! A range is written as a network prefix followed by wildcards, such as
//! `10.0.x` or `174.129.x.x`.  Repeated wildcards collapse, so `10.x.x.x`
//! and `10.x` are the same range.
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ConfigError;

const WILDCARD: &str = "x";

/// A single IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ip(Ipv4Addr);

impl Ip {
    /// Whether `input` is a complete dotted-quad address.
    #[must_use]
    pub fn is_valid(input: &str) -> bool {
        input.parse::<Self>().is_ok()
    }

    /// The four octets.
    #[must_use]
    pub const fn octets(self) -> [u8; 4] {
        self.0.octets()
    }

    /// The following address, or `None` after `255.255.255.255`.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        u32::from(self.0).checked_add(1).map(|n| Self(n.into()))
    }

    /// The preceding address, or `None` before `0.0.0.0`.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        u32::from(self.0).checked_sub(1).map(|n| Self(n.into()))
    }
}

impl From<[u8; 4]> for Ip {
    fn from(octets: [u8; 4]) -> Self {
        Self(octets.into())
    }
}

impl From<Ipv4Addr> for Ip {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr)
    }
}

impl From<Ip> for Ipv4Addr {
    fn from(ip: Ip) -> Self {
        ip.0
    }
}

impl FromStr for Ip {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedAddress {
            input: s.to_string(),
        };
        let pieces: Vec<&str> = s.split('.').collect();
        if pieces.len() != 4 {
            return Err(malformed());
        }
        let mut octets = [0_u8; 4];
        for (slot, piece) in octets.iter_mut().zip(pieces) {
            *slot = parse_octet(piece).ok_or_else(malformed)?;
        }
        Ok(Self::from(octets))
    }
}

impl fmt::Display for Ip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One position of a range's padded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeByte {
    /// Fixed network octet.
    Octet(u8),
    /// Host part.
    Wildcard,
}

impl fmt::Display for RangeByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Octet(n) => write!(f, "{n}"),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// A network written as fixed octets followed by wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpRange {
    network: Vec<u8>,
}

impl IpRange {
    /// Whether `input` is a well-formed range.
    #[must_use]
    pub fn is_valid(input: &str) -> bool {
        input.parse::<Self>().is_ok()
    }

    /// Fixed network octets (between one and three of them).
    #[must_use]
    pub fn network(&self) -> &[u8] {
        &self.network
    }

    /// Network octets followed by a single collapsed wildcard.
    #[must_use]
    pub fn bytes(&self) -> Vec<RangeByte> {
        self.network
            .iter()
            .copied()
            .map(RangeByte::Octet)
            .chain(std::iter::once(RangeByte::Wildcard))
            .collect()
    }

    /// The range padded back out to four positions.
    #[must_use]
    pub fn padded_bytes(&self) -> [RangeByte; 4] {
        let mut padded = [RangeByte::Wildcard; 4];
        for (slot, octet) in padded.iter_mut().zip(&self.network) {
            *slot = RangeByte::Octet(*octet);
        }
        padded
    }

    fn fill(&self, host: u8) -> [u8; 4] {
        let mut octets = [host; 4];
        for (slot, octet) in octets.iter_mut().zip(&self.network) {
            *slot = *octet;
        }
        octets
    }

    /// First usable address: the network with host part `0…01`.
    #[must_use]
    pub fn first(&self) -> Ip {
        let mut octets = self.fill(0);
        if let Some(last) = octets.last_mut() {
            *last = 1;
        }
        Ip::from(octets)
    }

    /// Last address in the range.
    #[must_use]
    pub fn last(&self) -> Ip {
        Ip::from(self.fill(255))
    }

    /// Broadcast address of the range.
    #[must_use]
    pub fn broadcast(&self) -> Ip {
        self.last()
    }

    /// Subnet mask covering the network octets.
    #[must_use]
    pub fn subnet(&self) -> Ip {
        let mut mask = [0_u8; 4];
        for slot in mask.iter_mut().take(self.network.len()) {
            *slot = 255;
        }
        Ip::from(mask)
    }

    /// Combine this network with a host-part pattern such as `x.x.x.1` or
    /// `x.254`.
    ///
    /// The pattern is right-aligned against the four positions.  Network
    /// positions come from the range; remaining positions take the
    /// pattern's octet, or `0` where the pattern has a wildcard or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedAddress`] if a pattern piece is
    /// neither an octet nor a wildcard, or there are more than four pieces.
    pub fn ip_for(&self, host: &str) -> Result<Ip, ConfigError> {
        let malformed = || ConfigError::MalformedAddress {
            input: host.to_string(),
        };
        let pieces: Vec<&str> = host.split('.').collect();
        let offset = 4_usize.checked_sub(pieces.len()).ok_or_else(malformed)?;
        let mut octets = self.fill(0);
        for (i, piece) in pieces.iter().enumerate() {
            let position = offset + i;
            if position < self.network.len() || *piece == WILDCARD {
                continue;
            }
            let octet = parse_octet(piece).ok_or_else(malformed)?;
            if let Some(slot) = octets.get_mut(position) {
                *slot = octet;
            }
        }
        Ok(Ip::from(octets))
    }
}

impl FromStr for IpRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedAddress {
            input: s.to_string(),
        };
        let pieces: Vec<&str> = s.split('.').collect();
        if pieces.len() > 4 {
            return Err(malformed());
        }
        let network: Vec<u8> = pieces
            .iter()
            .map_while(|piece| parse_octet(piece))
            .collect();
        let wildcards = pieces.get(network.len()..).unwrap_or_default();
        let all_wild = wildcards.iter().all(|piece| *piece == WILDCARD);
        if network.is_empty() || wildcards.is_empty() || !all_wild {
            return Err(malformed());
        }
        Ok(Self { network })
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.bytes().iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

fn parse_octet(piece: &str) -> Option<u8> {
    if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    piece.parse().ok()
}
