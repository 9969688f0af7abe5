//! Packet-list mutation pipeline.
//!
//! A [`PacketList`] is an ordered list of packets, each with the delay to
//! wait before sending it. A [`Mod`] takes such a list and returns the list
//! to send instead: with a packet duplicated, with IPv6 packets fragmented,
//! and so on. Mods are built from string arguments, either directly through
//! [`Mod::parse_args`] or by name through the [`modification::registry`].

pub mod modification;
pub mod packet;
pub mod packet_list;

pub use modification::{ConfigError, Mod, ModError, Params, build_mod, parse_mod_spec};
pub use packet::{Layer, Packet, PacketError};
pub use packet_list::{PacketList, PacketListError, TimedPacket};
