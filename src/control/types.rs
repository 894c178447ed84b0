//! Data model for link configuration and status.
//!
//! Values in this module exist only as transient arguments on their way to
//! or from hardware registers. The software keeps no authoritative copy
//! after a write; the device is the source of truth and is re-read to
//! verify.

use crate::bus::BusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by the device controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The link index is outside the range the hardware reports.
    #[error("link {0} does not exist")]
    LinkDoesNotExist(u32),
    /// The source-buffer index is outside the range the hardware reports.
    #[error("source buffer {0} does not exist")]
    SourceBufferDoesNotExist(u32),
    /// The identification register did not match the known constant; the
    /// device is not a compatible transmit front-end.
    #[error("identity register mismatch: found {found:#010x}, expected {expected:#010x}")]
    IdentityMismatch { found: u32, expected: u32 },
    /// The reported source count does not divide evenly across the links.
    #[error("{source_count} sources do not divide evenly across {link_count} links")]
    UnevenSourcePartition { source_count: u32, link_count: u32 },
    /// More synthetic generators requested than one link carries.
    #[error("{requested} generators requested but each link carries {available}")]
    GeneratorCountExceeded { requested: u32, available: u32 },
    /// A strict health check found the link unready or in error.
    #[error(
        "link {link} is in error (err:{err}, eth_rdy:{eth_ready}, src_rdy:{src_ready}, udp_rdy:{udp_ready})"
    )]
    LinkInError {
        link: u32,
        err: bool,
        eth_ready: bool,
        src_ready: bool,
        udp_ready: bool,
    },
    /// The underlying register bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// A 48-bit Ethernet hardware address.
///
/// The register file stores a MAC as two words: the lower 32 bits and the
/// upper 16 bits. The numeric value keeps the leftmost octet of the
/// `aa:bb:cc:dd:ee:ff` notation most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(u64);

impl MacAddr {
    /// Creates an address from its 48-bit numeric value; upper bits are
    /// discarded.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw & 0xffff_ffff_ffff)
    }

    /// Lower 32 bits, as written to the `*_mac_addr_lower` word.
    #[must_use]
    pub const fn lower(self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }

    /// Upper 16 bits, as written to the `*_mac_addr_upper` word.
    #[must_use]
    pub const fn upper(self) -> u32 {
        ((self.0 >> 32) & 0xffff) as u32
    }

    /// Reassembles an address from its two register words.
    #[must_use]
    pub const fn from_words(lower: u32, upper: u32) -> Self {
        Self((((upper & 0xffff) as u64) << 32) | lower as u64)
    }

    /// The 48-bit numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Error parsing a `aa:bb:cc:dd:ee:ff` hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mac address: {0:?}")]
pub struct MacParseError(pub String);

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split(':').collect();
        if octets.len() != 6 {
            return Err(MacParseError(s.to_string()));
        }
        let mut raw = 0u64;
        for octet in octets {
            if octet.len() != 2 {
                return Err(MacParseError(s.to_string()));
            }
            let byte = u8::from_str_radix(octet, 16).map_err(|_| MacParseError(s.to_string()))?;
            raw = (raw << 8) | u64::from(byte);
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// Fully resolved network endpoint pair for one link.
///
/// IP addresses are written to the device as big-endian `u32` words
/// (`u32::from(Ipv4Addr)`), matching the byte order the UDP core expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub source_mac: MacAddr,
    pub source_ip: Ipv4Addr,
    pub source_port: u16,
    pub dest_mac: MacAddr,
    pub dest_ip: Ipv4Addr,
    pub dest_port: u16,
    /// Packet filter word for the UDP core's receive side.
    pub filter_mask: u32,
}

/// Detector-geography tag carried by a link for downstream self-description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoTag {
    pub detector_id: u16,
    pub crate_id: u16,
    pub slot_id: u16,
}

impl fmt::Display for GeoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "det:{} crate:{} slot:{}",
            self.detector_id, self.crate_id, self.slot_id
        )
    }
}

/// Packet counters of one direction of a link's UDP core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacketCounters {
    pub arp: u32,
    pub ping: u32,
    pub udp: u32,
}

/// Point-in-time health of one link, recomputed on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkHealth {
    /// Hard error flag raised by the transmit block.
    pub err: bool,
    /// Ethernet PHY ready.
    pub eth_ready: bool,
    /// Source stream ready.
    pub src_ready: bool,
    /// UDP core ready.
    pub udp_ready: bool,
    /// Counters for packets received by the UDP core.
    pub received: PacketCounters,
    /// Counters for packets sent by the UDP core.
    pub sent: PacketCounters,
}

impl LinkHealth {
    /// A link is in error if its error flag is raised or any ready flag is
    /// down.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.err || !self.eth_ready || !self.src_ready || !self.udp_ready
    }
}
