use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::packet::FragmentError;
use crate::packet_list::{PacketList, PacketListError};

mod duplicate;
mod ipv6_frag;
pub mod registry;

pub use duplicate::{Duplicate, IndexSelector};
pub use ipv6_frag::Ipv6Frag;
pub use registry::{ModEntry, build_mod, parse_mod_spec};

/// Parameter name to display value, for logging and reproducing a run.
pub type Params = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "unrecognized or incorrect number of parameters for {name}: expected {expected}, got {got}"
    )]
    Arity { name: &'static str, expected: usize, got: usize },
    #[error("parameter {position} of {name} unrecognized, got {value:?}")]
    Unrecognized { name: &'static str, position: usize, value: String },
    #[error("parameter {position} of {name} must be at least {min}, got {value}")]
    BelowMinimum { name: &'static str, position: usize, value: usize, min: usize },
    #[error("unknown modification {0:?}")]
    UnknownMod(String),
    #[error("empty modification spec")]
    EmptySpec,
}

/// Failure of a collaborator during `apply`. Bad indices never end up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModError {
    #[error(transparent)]
    Fragment(#[from] FragmentError),
    #[error(transparent)]
    List(#[from] PacketListError),
}

/// A single packet-list transformation.
///
/// Configuration is parsed once by `parse_args` and never changes after
/// that, so `apply` only needs `&self`. `apply` takes the list by value and
/// hands back the list to send; whether that is the same list mutated in
/// place or a new one is documented on each implementation.
pub trait Mod: fmt::Debug + Send + Sync {
    fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError>
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    /// Whether `apply` is a pure function of its input.
    fn is_deterministic(&self) -> bool {
        true
    }

    fn get_params(&self) -> Params;

    fn apply(&self, list: PacketList) -> Result<PacketList, ModError>;

    fn describe(&self) -> String {
        let params: Vec<String> = self
            .get_params()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if params.is_empty() {
            self.name().to_string()
        } else {
            format!("{} {}", self.name(), params.join(" "))
        }
    }
}

pub fn check_arity<S: AsRef<str>>(
    name: &'static str,
    expected: usize,
    args: &[S],
) -> Result<(), ConfigError> {
    if args.len() != expected {
        return Err(ConfigError::Arity { name, expected, got: args.len() });
    }
    Ok(())
}
