//! Domain names and their store directory names.
//!
//! A [`DomainName`] is either a plain host name (`svc.local`) or a wildcard
//! pattern with exactly one leading `*.` label (`*.example.com`). Its
//! [`directory_name`](DomainName::directory_name) is the policy that keys
//! the per-domain bundle directories:
//!
//! | domain            | directory                   |
//! |-------------------|-----------------------------|
//! | `svc.local`       | `svc.local`                 |
//! | `*.example.com`   | `_wildcard.example.com`     |
//!
//! `_` is not accepted in host names, so the wildcard namespace can never
//! collide with a plain name.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const WILDCARD_PREFIX: &str = "*.";
const WILDCARD_DIRECTORY_PREFIX: &str = "_wildcard.";
const MAX_NAME_LEN: usize = 253;

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("label pattern is valid")
});

/// A validated, lowercase domain name or single-level wildcard pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName {
    base: String,
    wildcard: bool,
}

impl DomainName {
    /// Validate and normalize `input`.
    ///
    /// Surrounding whitespace and one trailing dot are dropped and the name
    /// is lowercased. Rejected: empty names, `*` anywhere but a single leading
    /// `*.` label (`**.a.com`, `*.*.a.com`, `a*.com`), wildcards directly
    /// under a single label (`*.com`), IP literals, and anything that is not
    /// LDH labels of 1-63 characters.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        let normalized = trimmed
            .strip_suffix('.')
            .unwrap_or(trimmed)
            .to_ascii_lowercase();
        let invalid = |reason: &str| Error::InvalidInput(format!("domain {input:?} {reason}"));

        if normalized.is_empty() {
            return Err(invalid("is empty"));
        }
        if normalized.len() > MAX_NAME_LEN {
            return Err(invalid("is longer than 253 characters"));
        }

        let (base, wildcard) = match normalized.strip_prefix(WILDCARD_PREFIX) {
            Some(rest) => (rest.to_string(), true),
            None => (normalized, false),
        };

        if base.contains('*') {
            return Err(invalid("may only contain a single leading \"*.\" label"));
        }
        if base.parse::<IpAddr>().is_ok() {
            return Err(invalid("is an IP address; pass it as the IP address instead"));
        }
        if let Some(label) = base.split('.').find(|label| !LABEL.is_match(label)) {
            return Err(invalid(&format!("has an invalid label {label:?}")));
        }
        if wildcard && !base.contains('.') {
            return Err(invalid("wildcards need at least two labels after \"*.\""));
        }

        Ok(Self { base, wildcard })
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The name without the wildcard marker.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The name as it appears in the certificate (CN and DNS SAN).
    pub fn as_san(&self) -> String {
        if self.wildcard {
            format!("{WILDCARD_PREFIX}{}", self.base)
        } else {
            self.base.clone()
        }
    }

    /// Filesystem-safe, collision-free directory name for this domain.
    pub fn directory_name(&self) -> String {
        if self.wildcard {
            format!("{WILDCARD_DIRECTORY_PREFIX}{}", self.base)
        } else {
            self.base.clone()
        }
    }

    /// Inverse of [`directory_name`](Self::directory_name), for walking the store.
    pub fn from_directory_name(directory: &str) -> Result<Self, Error> {
        match directory.strip_prefix(WILDCARD_DIRECTORY_PREFIX) {
            Some(base) => Self::parse(&format!("{WILDCARD_PREFIX}{base}")),
            None => Self::parse(directory),
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_san())
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DomainName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_san())
    }
}

impl<'de> Deserialize<'de> for DomainName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(input: &str) -> String {
        DomainName::parse(input).unwrap().directory_name()
    }

    #[test]
    fn plain_names_map_to_themselves() {
        assert_eq!(dir("svc.local"), "svc.local");
        assert_eq!(dir("  API.Example.COM. "), "api.example.com");
        assert_eq!(dir("localhost"), "localhost");
    }

    #[test]
    fn wildcard_and_apex_never_collide() {
        let wildcard = DomainName::parse("*.a.com").unwrap();
        let apex = DomainName::parse("a.com").unwrap();
        assert_ne!(wildcard.directory_name(), apex.directory_name());
        assert_eq!(wildcard.directory_name(), "_wildcard.a.com");
        assert_eq!(wildcard.as_san(), "*.a.com");
        assert_eq!(wildcard.base(), apex.base());
    }

    #[test]
    fn doubly_starred_inputs_are_rejected() {
        for input in ["**.a.com", "*.*.a.com", "*a.com", "a*.com", "a.*.com", "*", "*."] {
            assert!(
                matches!(DomainName::parse(input), Err(Error::InvalidInput(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn unsafe_and_malformed_names_are_rejected() {
        for input in [
            "",
            "   ",
            "../etc",
            "a/b.com",
            "a\\b.com",
            "a..com",
            ".a.com",
            "-a.com",
            "a-.com",
            "under_score.com",
            "_wildcard.a.com",
            "10.0.0.5",
            "::1",
            "*.com",
            "a.com..",
            ".",
        ] {
            assert!(DomainName::parse(input).is_err(), "{input:?} should be rejected");
        }
        assert!(DomainName::parse(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn single_trailing_dot_is_dropped() {
        let domain = DomainName::parse("A.com.").unwrap();
        assert_eq!(domain.as_san(), "a.com");
    }

    #[test]
    fn directory_names_round_trip() {
        for input in ["svc.local", "*.example.com"] {
            let domain = DomainName::parse(input).unwrap();
            assert_eq!(
                DomainName::from_directory_name(&domain.directory_name()).unwrap(),
                domain
            );
        }
    }
}
