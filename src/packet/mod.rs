use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

pub mod fragment;
pub mod ipv6;

pub use fragment::{FragmentError, MIN_FRAGSIZE, fragment6, fragment6_with_id, reassemble6};

const IPV4_HEADER_LEN: usize = 20;
const PROTO_ICMP: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Ipv4,
    Ipv6,
    Ipv6Fragment,
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
}

/// A raw L3 datagram (IPv4 or IPv6, no link layer).
///
/// The packet owns its buffer, so `clone` is always a deep copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    data: Vec<u8>,
}

impl Packet {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Builds an IPv6 datagram with a 40 byte fixed header.
    pub fn ipv6(
        next_header: u8,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        payload: &[u8],
    ) -> Result<Self, PacketError> {
        ipv6::build(next_header, src, dst, payload)
            .map(Self::new)
            .ok_or(PacketError::PayloadTooLarge(payload.len()))
    }

    /// Builds an IPv4 datagram with a 20 byte header and a valid checksum.
    pub fn ipv4(
        protocol: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        payload: &[u8],
    ) -> Result<Self, PacketError> {
        let total = u16::try_from(IPV4_HEADER_LEN + payload.len())
            .map_err(|_| PacketError::PayloadTooLarge(payload.len()))?;
        let mut data = Vec::with_capacity(total as usize);
        data.extend_from_slice(&[0x45, 0]);
        data.extend_from_slice(&total.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0x40, 0, 64, protocol, 0, 0]);
        data.extend_from_slice(&src.octets());
        data.extend_from_slice(&dst.octets());

        let checksum = ipv4_checksum(&data);
        data[10..12].copy_from_slice(&checksum.to_be_bytes());
        data.extend_from_slice(payload);
        Ok(Self::new(data))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn version(&self) -> Option<u8> {
        self.data.first().map(|b| b >> 4)
    }

    pub fn is_ipv6(&self) -> bool {
        self.has_layer(Layer::Ipv6)
    }

    pub fn has_layer(&self, layer: Layer) -> bool {
        match layer {
            Layer::Ipv4 => self.version() == Some(4) && self.len() >= IPV4_HEADER_LEN,
            Layer::Ipv6 => self.version() == Some(6) && self.len() >= ipv6::HEADER_LEN,
            Layer::Ipv6Fragment => ipv6::walk_chain(&self.data)
                .is_some_and(|chain| chain.fragment_header().is_some()),
            Layer::Tcp => self.upper_protocol() == Some(ipv6::NEXT_TCP),
            Layer::Udp => self.upper_protocol() == Some(ipv6::NEXT_UDP),
            Layer::Icmp => {
                self.has_layer(Layer::Ipv4) && self.upper_protocol() == Some(PROTO_ICMP)
            }
            Layer::Icmpv6 => self.upper_protocol() == Some(ipv6::NEXT_ICMPV6),
        }
    }

    /// Transport protocol number, if the transport header is in this packet.
    fn upper_protocol(&self) -> Option<u8> {
        match self.version()? {
            4 if self.len() >= IPV4_HEADER_LEN => {
                // Only the first IPv4 fragment carries the transport header.
                let frag = u16::from_be_bytes([self.data[6], self.data[7]]) & 0x1FFF;
                (frag == 0).then_some(self.data[9])
            }
            6 => ipv6::walk_chain(&self.data)
                .filter(|chain| chain.upper_present)
                .map(|chain| chain.upper),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_layer(Layer::Ipv6Fragment) {
            write!(f, "IPv6/Frag {}B", self.len())
        } else if self.has_layer(Layer::Ipv6) {
            write!(f, "IPv6 {}B", self.len())
        } else if self.has_layer(Layer::Ipv4) {
            write!(f, "IPv4 {}B", self.len())
        } else {
            write!(f, "raw {}B", self.len())
        }
    }
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|w| u16::from_be_bytes([w[0], *w.get(1).unwrap_or(&0)]) as u32)
        .sum();
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
