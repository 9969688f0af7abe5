//! IPv6 fragmentation and reassembly (RFC 8200 section 4.5).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use super::ipv6::{self, FRAGMENT_HEADER_LEN, NEXT_FRAGMENT};
use super::Packet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("packet is not IPv6")]
    NotIpv6,
    #[error("IPv6 header chain is truncated")]
    Truncated,
    #[error("fragment size {fragsize} is too small, at least {required} bytes are needed")]
    TooSmall { fragsize: usize, required: usize },
    #[error("packet of {0} bytes does not fit IPv6 fragment offsets")]
    Oversized(usize),
    #[error("packet carries no fragment header")]
    NotFragment,
    #[error("fragments belong to different datagrams")]
    Inconsistent,
    #[error("fragment set is incomplete or overlapping")]
    Incomplete,
}

/// Smallest fragment able to carry payload: fixed header, Fragment header
/// and one 8 byte block.
pub const MIN_FRAGSIZE: usize = ipv6::HEADER_LEN + FRAGMENT_HEADER_LEN + 8;

/// Splits an IPv6 packet into fragments of at most `fragsize` bytes.
///
/// The identification field is derived from the packet bytes, so the same
/// packet always produces the same fragments. Packets that already fit are
/// returned as a single unmodified element (no atomic fragments).
pub fn fragment6(packet: &Packet, fragsize: usize) -> Result<Vec<Packet>, FragmentError> {
    let mut hasher = DefaultHasher::new();
    packet.as_bytes().hash(&mut hasher);
    fragment6_with_id(packet, fragsize, hasher.finish() as u32)
}

pub fn fragment6_with_id(
    packet: &Packet,
    fragsize: usize,
    id: u32,
) -> Result<Vec<Packet>, FragmentError> {
    if !packet.is_ipv6() {
        return Err(FragmentError::NotIpv6);
    }
    if packet.len() <= fragsize {
        return Ok(vec![packet.clone()]);
    }

    let data = packet.as_bytes();
    let chain = ipv6::walk_chain(data).ok_or(FragmentError::Truncated)?;
    let (unfrag_len, patch_at) = ipv6::unfragmentable(&chain);
    let next_header = data[patch_at];

    // Every fragment but the last must carry a multiple of 8 bytes.
    let required = unfrag_len + FRAGMENT_HEADER_LEN + 8;
    if fragsize < required {
        return Err(FragmentError::TooSmall { fragsize, required });
    }
    let chunk = (fragsize - unfrag_len - FRAGMENT_HEADER_LEN) & !7;

    let body = &data[unfrag_len..];
    let mut fragments = Vec::with_capacity(body.len().div_ceil(chunk));
    for (i, piece) in body.chunks(chunk).enumerate() {
        let offset = i * chunk;
        let more = offset + piece.len() < body.len();
        let header = ipv6::fragment_header(next_header, offset, more, id)
            .ok_or(FragmentError::Oversized(packet.len()))?;

        let mut buf = Vec::with_capacity(unfrag_len + FRAGMENT_HEADER_LEN + piece.len());
        buf.extend_from_slice(&data[..unfrag_len]);
        buf[patch_at] = NEXT_FRAGMENT;
        buf.extend_from_slice(&header);
        buf.extend_from_slice(piece);
        ipv6::set_payload_length(&mut buf).ok_or(FragmentError::Oversized(packet.len()))?;

        fragments.push(Packet::new(buf));
    }

    Ok(fragments)
}

/// Rebuilds the original datagram from its fragments, given in any order.
pub fn reassemble6(fragments: &[Packet]) -> Result<Packet, FragmentError> {
    let mut id = None;
    let mut head = None;
    let mut pieces = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        if !fragment.is_ipv6() {
            return Err(FragmentError::NotIpv6);
        }
        let data = fragment.as_bytes();
        let chain = ipv6::walk_chain(data).ok_or(FragmentError::Truncated)?;
        let (idx, frag) = chain.fragment_header().ok_or(FragmentError::NotFragment)?;
        let header = &data[frag.start..frag.start + FRAGMENT_HEADER_LEN];

        let this_id = ipv6::identification(header);
        if *id.get_or_insert(this_id) != this_id {
            return Err(FragmentError::Inconsistent);
        }

        let offset = ipv6::fragment_offset(header);
        if offset == 0 {
            head = Some((data, frag.start, chain.next_header_field(idx), header[0]));
        }
        let body = &data[frag.start + FRAGMENT_HEADER_LEN..];
        pieces.push((offset, ipv6::more_fragments(header), body));
    }

    let (head, frag_start, patch_at, next_header) = head.ok_or(FragmentError::Incomplete)?;
    pieces.sort_by_key(|(offset, _, _)| *offset);

    let mut buf = head[..frag_start].to_vec();
    buf[patch_at] = next_header;

    let mut expected = 0;
    for (offset, _, piece) in &pieces {
        if *offset != expected {
            return Err(FragmentError::Incomplete);
        }
        buf.extend_from_slice(piece);
        expected += piece.len();
    }
    if pieces.last().is_some_and(|(_, more, _)| *more) {
        return Err(FragmentError::Incomplete);
    }

    let len = buf.len();
    ipv6::set_payload_length(&mut buf).ok_or(FragmentError::Oversized(len))?;
    Ok(Packet::new(buf))
}
