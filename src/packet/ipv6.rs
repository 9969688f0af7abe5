use std::net::Ipv6Addr;

pub const HEADER_LEN: usize = 40;
pub const FRAGMENT_HEADER_LEN: usize = 8;

pub const NEXT_HOP_BY_HOP: u8 = 0;
pub const NEXT_TCP: u8 = 6;
pub const NEXT_UDP: u8 = 17;
pub const NEXT_ROUTING: u8 = 43;
pub const NEXT_FRAGMENT: u8 = 44;
pub const NEXT_ICMPV6: u8 = 58;
pub const NEXT_NONE: u8 = 59;
pub const NEXT_DEST_OPTS: u8 = 60;

// Offsets are carried in 8-octet units in a 13 bit field.
const MAX_FRAGMENT_OFFSET: usize = 0x1FFF * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtHeader {
    pub kind: u8,
    pub start: usize,
    pub len: usize,
}

/// Extension headers found after the fixed header, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub headers: Vec<ExtHeader>,
    pub upper: u8,
    /// False when the upper layer is not in this packet (No Next Header, or a
    /// non-first fragment).
    pub upper_present: bool,
}

impl Chain {
    /// Byte position of the next-header field announcing `headers[idx]`.
    pub fn next_header_field(&self, idx: usize) -> usize {
        if idx == 0 { 6 } else { self.headers[idx - 1].start }
    }

    pub fn fragment_header(&self) -> Option<(usize, &ExtHeader)> {
        self.headers.iter().enumerate().find(|(_, h)| h.kind == NEXT_FRAGMENT)
    }
}

pub fn is_extension(next_header: u8) -> bool {
    matches!(
        next_header,
        NEXT_HOP_BY_HOP | NEXT_ROUTING | NEXT_FRAGMENT | NEXT_DEST_OPTS
    )
}

/// Walks the extension header chain of an IPv6 datagram.
///
/// Returns `None` if the buffer is not IPv6 or a header runs past the end.
pub fn walk_chain(data: &[u8]) -> Option<Chain> {
    if data.len() < HEADER_LEN || data[0] >> 4 != 6 {
        return None;
    }

    let mut headers = Vec::new();
    let mut kind = data[6];
    let mut pos = HEADER_LEN;

    while is_extension(kind) {
        let len = if kind == NEXT_FRAGMENT {
            FRAGMENT_HEADER_LEN
        } else {
            (*data.get(pos + 1)? as usize + 1) * 8
        };
        if pos + len > data.len() {
            return None;
        }
        headers.push(ExtHeader { kind, start: pos, len });

        let next = data[pos];
        if kind == NEXT_FRAGMENT && fragment_offset(&data[pos..pos + len]) != 0 {
            return Some(Chain { headers, upper: next, upper_present: false });
        }
        kind = next;
        pos += len;
    }

    Some(Chain { headers, upper: kind, upper_present: kind != NEXT_NONE })
}

/// Splits the chain into the part repeated in every fragment.
///
/// Returns the length of the unfragmentable part and the position of the
/// next-header byte that has to point at the Fragment header.
pub fn unfragmentable(chain: &Chain) -> (usize, usize) {
    chain
        .headers
        .iter()
        .take_while(|h| h.kind != NEXT_FRAGMENT)
        .filter(|h| matches!(h.kind, NEXT_HOP_BY_HOP | NEXT_ROUTING))
        .last()
        .map(|h| (h.start + h.len, h.start))
        .unwrap_or((HEADER_LEN, 6))
}

/// Offset in bytes carried by a Fragment header.
pub fn fragment_offset(header: &[u8]) -> usize {
    (u16::from_be_bytes([header[2], header[3]]) >> 3) as usize * 8
}

pub fn more_fragments(header: &[u8]) -> bool {
    header[3] & 0x01 != 0
}

pub fn identification(header: &[u8]) -> u32 {
    u32::from_be_bytes([header[4], header[5], header[6], header[7]])
}

/// Encodes a Fragment header. `offset` must be a multiple of 8.
pub fn fragment_header(next_header: u8, offset: usize, more: bool, id: u32) -> Option<[u8; 8]> {
    if offset % 8 != 0 || offset > MAX_FRAGMENT_OFFSET {
        return None;
    }
    let field = ((offset / 8) as u16) << 3 | more as u16;
    let [o0, o1] = field.to_be_bytes();
    let [i0, i1, i2, i3] = id.to_be_bytes();
    Some([next_header, 0, o0, o1, i0, i1, i2, i3])
}

/// Rewrites Payload Length from the buffer size.
pub fn set_payload_length(buf: &mut [u8]) -> Option<()> {
    let payload = u16::try_from(buf.len().checked_sub(HEADER_LEN)?).ok()?;
    buf[4..6].copy_from_slice(&payload.to_be_bytes());
    Some(())
}

/// Builds a datagram with a fixed header in front of `payload`.
///
/// Returns `None` when the payload does not fit Payload Length (no jumbograms).
pub fn build(next_header: u8, src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> Option<Vec<u8>> {
    let payload_len = u16::try_from(payload.len()).ok()?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&[0x60, 0, 0, 0]);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.push(next_header);
    buf.push(64);
    buf.extend_from_slice(&src.octets());
    buf.extend_from_slice(&dst.octets());
    buf.extend_from_slice(payload);
    Some(buf)
}

pub fn destination(data: &[u8]) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = data.get(24..40)?.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}
