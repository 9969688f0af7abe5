use tracing::debug;

use crate::modification::{ConfigError, Mod, ModError, Params, check_arity};
use crate::packet::{MIN_FRAGSIZE, fragment6};
use crate::packet_list::PacketList;

/// Fragments IPv6 packets at L3.
///
/// Usage: `ipv6_frag <size>`, where `size` is the largest fragment allowed,
/// headers included, and no smaller than [`MIN_FRAGSIZE`]. Always builds a new
/// list since the packet count changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Frag {
    fragsize: usize,
}

impl Ipv6Frag {
    pub const NAME: &'static str = "Ipv6Frag";
    pub const USAGE: &'static str = "Fragments the IPv6 packets at the L3-layer\nipv6_frag <size>";
    const NB_ARGS: usize = 1;

    pub fn new(fragsize: usize) -> Self {
        Self { fragsize }
    }

    pub fn fragsize(&self) -> usize {
        self.fragsize
    }
}

impl Mod for Ipv6Frag {
    fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        check_arity(Self::NAME, Self::NB_ARGS, args)?;

        let arg = args[0].as_ref();
        let fragsize = arg.parse().map_err(|_| ConfigError::Unrecognized {
            name: Self::NAME,
            position: 1,
            value: arg.to_string(),
        })?;
        if fragsize < MIN_FRAGSIZE {
            return Err(ConfigError::BelowMinimum {
                name: Self::NAME,
                position: 1,
                value: fragsize,
                min: MIN_FRAGSIZE,
            });
        }

        Ok(Self::new(fragsize))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn get_params(&self) -> Params {
        Params::from([("fragsize", self.fragsize.to_string())])
    }

    fn apply(&self, list: PacketList) -> Result<PacketList, ModError> {
        let mut out = PacketList::new();

        for entry in list {
            // Packets that already fit are kept whole, no atomic fragments.
            if !entry.packet.is_ipv6() || entry.packet.len() <= self.fragsize {
                out.push(entry);
                continue;
            }

            let fragments = fragment6(&entry.packet, self.fragsize)?;
            debug!(len = entry.packet.len(), fragments = fragments.len(), "fragmented packet");

            // The original wait goes on the first fragment, the rest follow at once.
            let first = out.len() as isize;
            for fragment in fragments {
                out.add_packet(fragment);
            }
            out.edit_delay(first, entry.delay)?;
        }

        Ok(out)
    }
}
