//! Name to constructor table for the available modifications.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::modification::{ConfigError, Duplicate, Ipv6Frag, Mod};

pub type BuildFn = fn(&[String]) -> Result<Box<dyn Mod>, ConfigError>;

#[derive(Debug, Clone, Copy)]
pub struct ModEntry {
    /// Name used on the command line.
    pub name: &'static str,
    pub usage: &'static str,
    pub build: BuildFn,
}

fn boxed<M: Mod + 'static>(args: &[String]) -> Result<Box<dyn Mod>, ConfigError> {
    Ok(Box::new(M::parse_args(args)?))
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, ModEntry> = {
        let mut m = HashMap::new();
        for entry in [
            ModEntry { name: "duplicate", usage: Duplicate::USAGE, build: boxed::<Duplicate> },
            ModEntry { name: "ipv6_frag", usage: Ipv6Frag::USAGE, build: boxed::<Ipv6Frag> },
        ] {
            m.insert(entry.name, entry);
        }
        m
    };
}

pub fn lookup(name: &str) -> Option<&'static ModEntry> {
    REGISTRY.get(name)
}

/// All registered modifications, sorted by name.
pub fn entries() -> Vec<&'static ModEntry> {
    let mut entries: Vec<_> = REGISTRY.values().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

pub fn build_mod(name: &str, args: &[String]) -> Result<Box<dyn Mod>, ConfigError> {
    let entry = lookup(name).ok_or_else(|| ConfigError::UnknownMod(name.to_string()))?;
    (entry.build)(args)
}

/// Builds a modification from a whitespace separated spec such as
/// `"duplicate random"`.
pub fn parse_mod_spec(spec: &str) -> Result<Box<dyn Mod>, ConfigError> {
    let mut tokens = spec.split_whitespace();
    let name = tokens.next().ok_or(ConfigError::EmptySpec)?;
    let args: Vec<String> = tokens.map(str::to_string).collect();
    build_mod(name, &args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_by_name() {
        let m = parse_mod_spec("duplicate random").unwrap();
        assert_eq!(m.name(), "Duplicate");
        assert!(!m.is_deterministic());

        let m = parse_mod_spec("  ipv6_frag   1280 ").unwrap();
        assert_eq!(m.get_params()["fragsize"], "1280");
    }

    #[test]
    fn rejects_bad_specs() {
        assert_eq!(
            parse_mod_spec("reorder 3").unwrap_err(),
            ConfigError::UnknownMod("reorder".into())
        );
        assert_eq!(parse_mod_spec("   ").unwrap_err(), ConfigError::EmptySpec);
        assert!(matches!(parse_mod_spec("ipv6_frag").unwrap_err(), ConfigError::Arity { .. }));
    }

    #[test]
    fn entries_are_sorted() {
        let names: Vec<_> = entries().iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["duplicate", "ipv6_frag"]);
    }
}
