use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketListError {
    #[error("index {index} out of range for a list of {len} packets")]
    IndexOutOfRange { index: isize, len: usize },
}

/// A packet and the time to wait, after the previous one, before sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPacket {
    pub packet: Packet,
    pub delay: Duration,
}

impl TimedPacket {
    pub fn new(packet: Packet) -> Self {
        Self::with_delay(packet, Duration::ZERO)
    }

    pub fn with_delay(packet: Packet, delay: Duration) -> Self {
        Self { packet, delay }
    }
}

/// Ordered list of timed packets.
///
/// Positional operations take `isize` indices: `0..len` from the front and
/// `-len..-1` from the back (`-1` is the last packet).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketList {
    packets: Vec<TimedPacket>,
}

impl PacketList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Physical position of `index`, or `None` outside `[-len, len-1]`.
    pub fn resolve_index(&self, index: isize) -> Option<usize> {
        let len = self.packets.len() as isize;
        if index >= len || index < -len {
            return None;
        }
        let pos = if index < 0 { index + len } else { index };
        Some(pos as usize)
    }

    pub fn get(&self, index: isize) -> Option<&TimedPacket> {
        self.resolve_index(index).map(|pos| &self.packets[pos])
    }

    pub fn get_mut(&mut self, index: isize) -> Option<&mut TimedPacket> {
        self.resolve_index(index).map(|pos| &mut self.packets[pos])
    }

    pub fn push(&mut self, packet: TimedPacket) {
        self.packets.push(packet);
    }

    /// Appends a packet with no delay.
    pub fn add_packet(&mut self, packet: Packet) {
        self.push(TimedPacket::new(packet));
    }

    pub fn add_delayed_packet(&mut self, packet: Packet, delay: Duration) {
        self.push(TimedPacket::with_delay(packet, delay));
    }

    /// Inserts `packet` right after the packet at `index`, with no delay.
    ///
    /// Returns the position of the inserted packet.
    pub fn insert_packet(
        &mut self,
        index: isize,
        packet: Packet,
    ) -> Result<usize, PacketListError> {
        let pos = self.checked(index)? + 1;
        self.packets.insert(pos, TimedPacket::new(packet));
        Ok(pos)
    }

    pub fn edit_delay(&mut self, index: isize, delay: Duration) -> Result<(), PacketListError> {
        let pos = self.checked(index)?;
        self.packets[pos].delay = delay;
        Ok(())
    }

    pub fn remove_packet(&mut self, index: isize) -> Result<TimedPacket, PacketListError> {
        let pos = self.checked(index)?;
        Ok(self.packets.remove(pos))
    }

    /// Time needed to send the whole list.
    pub fn total_delay(&self) -> Duration {
        self.packets.iter().map(|p| p.delay).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedPacket> {
        self.packets.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TimedPacket> {
        self.packets.iter_mut()
    }

    fn checked(&self, index: isize) -> Result<usize, PacketListError> {
        self.resolve_index(index)
            .ok_or(PacketListError::IndexOutOfRange { index, len: self.len() })
    }
}

impl IntoIterator for PacketList {
    type Item = TimedPacket;
    type IntoIter = std::vec::IntoIter<TimedPacket>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.into_iter()
    }
}

impl<'a> IntoIterator for &'a PacketList {
    type Item = &'a TimedPacket;
    type IntoIter = std::slice::Iter<'a, TimedPacket>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

impl FromIterator<TimedPacket> for PacketList {
    fn from_iter<I: IntoIterator<Item = TimedPacket>>(iter: I) -> Self {
        Self { packets: iter.into_iter().collect() }
    }
}

impl FromIterator<Packet> for PacketList {
    fn from_iter<I: IntoIterator<Item = Packet>>(iter: I) -> Self {
        iter.into_iter().map(TimedPacket::new).collect()
    }
}

impl Extend<TimedPacket> for PacketList {
    fn extend<I: IntoIterator<Item = TimedPacket>>(&mut self, iter: I) {
        self.packets.extend(iter);
    }
}

impl fmt::Display for PacketList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.packets.iter().enumerate() {
            let delay_ms = entry.delay.as_secs_f64() * 1000.0;
            writeln!(f, "{:>4} | +{:>8.3}ms | {}", i, delay_ms, entry.packet)?;
        }
        Ok(())
    }
}
