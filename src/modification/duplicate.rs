use std::fmt;

use rand::Rng;
use tracing::{debug, trace};

use crate::modification::{ConfigError, Mod, ModError, Params, check_arity};
use crate::packet_list::PacketList;

/// Which packet to duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSelector {
    Fixed(isize),
    /// Drawn again on every `apply`.
    Random,
}

impl fmt::Display for IndexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSelector::Fixed(i) => write!(f, "{i}"),
            IndexSelector::Random => f.write_str("random"),
        }
    }
}

/// Duplicates one packet and places the copy right after the original.
///
/// Usage: `duplicate {first|last|random|<id>}`. The list is mutated in place
/// and returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    duplicate_index: IndexSelector,
}

impl Duplicate {
    pub const NAME: &'static str = "Duplicate";
    pub const USAGE: &'static str =
        "Duplicate one of the packets.\nduplicate {first|last|random|<id>}";
    const NB_ARGS: usize = 1;

    pub fn new(duplicate_index: IndexSelector) -> Self {
        Self { duplicate_index }
    }

    pub fn duplicate_index(&self) -> IndexSelector {
        self.duplicate_index
    }

    /// `apply` with an explicit random source.
    pub fn apply_with_rng<R: Rng>(
        &self,
        mut list: PacketList,
        rng: &mut R,
    ) -> Result<PacketList, ModError> {
        let len = list.len() as isize;
        if len == 0 {
            return Ok(list);
        }

        // The draw covers the signed range [-len, len-1], each position being
        // reachable from both ends. Kept signed so existing seeded runs replay.
        let index = match self.duplicate_index {
            IndexSelector::Fixed(i) => i,
            IndexSelector::Random if len == 1 => 0,
            IndexSelector::Random => rng.gen_range(-len..=len - 1),
        };

        let Some(entry) = list.get(index) else {
            trace!(index, len, "duplicate index out of range, list left untouched");
            return Ok(list);
        };
        let copy = entry.packet.clone();
        let pos = list.insert_packet(index, copy)?;
        debug!(index, pos, "duplicated packet");

        Ok(list)
    }
}

impl Mod for Duplicate {
    fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        check_arity(Self::NAME, Self::NB_ARGS, args)?;

        let arg = args[0].as_ref();
        let duplicate_index = match arg {
            "first" => IndexSelector::Fixed(0),
            "last" => IndexSelector::Fixed(-1),
            "random" => IndexSelector::Random,
            other => other.parse().map(IndexSelector::Fixed).map_err(|_| {
                ConfigError::Unrecognized { name: Self::NAME, position: 1, value: arg.to_string() }
            })?,
        };

        Ok(Self::new(duplicate_index))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_deterministic(&self) -> bool {
        self.duplicate_index != IndexSelector::Random
    }

    fn get_params(&self) -> Params {
        Params::from([("duplicate_index", self.duplicate_index.to_string())])
    }

    fn apply(&self, list: PacketList) -> Result<PacketList, ModError> {
        self.apply_with_rng(list, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::packet::Packet;
    use std::time::Duration;

    fn list(n: u8) -> PacketList {
        let mut l = PacketList::new();
        for i in 0..n {
            l.add_delayed_packet(Packet::new(vec![i; 4]), Duration::from_millis(i as u64 + 1));
        }
        l
    }

    fn firsts(l: &PacketList) -> Vec<u8> {
        l.iter().map(|p| p.packet.as_bytes()[0]).collect()
    }

    #[test]
    fn parse() {
        let selector = |arg: &str| Duplicate::parse_args(&[arg]).unwrap().duplicate_index();
        assert_eq!(selector("first"), IndexSelector::Fixed(0));
        assert_eq!(selector("last"), IndexSelector::Fixed(-1));
        assert_eq!(selector("random"), IndexSelector::Random);
        assert_eq!(selector("18"), IndexSelector::Fixed(18));
        assert_eq!(selector("-3"), IndexSelector::Fixed(-3));

        assert_eq!(
            Duplicate::parse_args(&["middle"]),
            Err(ConfigError::Unrecognized {
                name: "Duplicate",
                position: 1,
                value: "middle".into()
            })
        );
        assert!(matches!(
            Duplicate::parse_args(&["1", "2"]),
            Err(ConfigError::Arity { got: 2, .. })
        ));
        assert!(matches!(
            Duplicate::parse_args::<&str>(&[]),
            Err(ConfigError::Arity { got: 0, .. })
        ));
    }

    #[test]
    fn determinism_follows_selector() {
        assert!(Duplicate::parse_args(&["last"]).unwrap().is_deterministic());
        assert!(Duplicate::parse_args(&["4"]).unwrap().is_deterministic());
        assert!(!Duplicate::parse_args(&["random"]).unwrap().is_deterministic());
    }

    #[test]
    fn params_render_random_token() {
        let params = Duplicate::parse_args(&["random"]).unwrap().get_params();
        assert_eq!(params["duplicate_index"], "random");
        let params = Duplicate::parse_args(&["last"]).unwrap().get_params();
        assert_eq!(params["duplicate_index"], "-1");
    }

    #[test]
    fn duplicates_after_source() {
        let out = Duplicate::new(IndexSelector::Fixed(1)).apply(list(3)).unwrap();
        assert_eq!(firsts(&out), vec![0, 1, 1, 2]);
        assert_eq!(out.get(1).unwrap().delay, Duration::from_millis(2));
        assert_eq!(out.get(2).unwrap().delay, Duration::ZERO);

        let out = Duplicate::new(IndexSelector::Fixed(-1)).apply(list(3)).unwrap();
        assert_eq!(firsts(&out), vec![0, 1, 2, 2]);
    }

    #[test]
    fn copy_does_not_alias() {
        let mut out = Duplicate::new(IndexSelector::Fixed(0)).apply(list(2)).unwrap();
        out.get_mut(1).unwrap().packet.as_bytes_mut()[0] = 0xFF;
        assert_eq!(out.get(0).unwrap().packet.as_bytes(), &[0; 4]);
    }

    #[test]
    fn out_of_range_is_a_no_op() {
        for index in [3, 100, -4] {
            let out = Duplicate::new(IndexSelector::Fixed(index)).apply(list(3)).unwrap();
            assert_eq!(out, list(3));
        }
    }

    #[test]
    fn empty_list_is_returned_unchanged() {
        let out = Duplicate::new(IndexSelector::Random).apply(PacketList::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn random_on_single_packet_duplicates_it() {
        let out = Duplicate::new(IndexSelector::Random).apply(list(1)).unwrap();
        assert_eq!(firsts(&out), vec![0, 0]);
    }

    #[test]
    fn random_always_inserts_one_copy() {
        let mut rng = StdRng::seed_from_u64(7);
        let dup = Duplicate::new(IndexSelector::Random);
        for _ in 0..50 {
            let out = dup.apply_with_rng(list(5), &mut rng).unwrap();
            assert_eq!(out.len(), 6);
            let bytes = firsts(&out);
            assert!(bytes.windows(2).any(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn random_index_is_drawn_from_signed_range() {
        let dup = Duplicate::new(IndexSelector::Random);
        let mut saw_negative = false;

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let drawn: isize = rng.clone().gen_range(-5..=4);
            saw_negative |= drawn < 0;

            let pos = list(5).resolve_index(drawn).unwrap();
            let mut expected: Vec<u8> = (0..5).collect();
            expected.insert(pos + 1, pos as u8);

            let out = dup.apply_with_rng(list(5), &mut rng).unwrap();
            assert_eq!(firsts(&out), expected, "seed {seed} drew {drawn}");
        }
        assert!(saw_negative);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let dup = Duplicate::new(IndexSelector::Random);
        let a = dup.apply_with_rng(list(8), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = dup.apply_with_rng(list(8), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
