use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

/// A `major.minor` version, as used for HAL versions, the manifest meta version and the
/// sepolicy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: usize,
    pub minor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{input}` is not a valid `<major>.<minor>` version")]
pub struct VersionParseError {
    pub input: String,
}

impl Version {
    pub const fn new(major: usize, minor: usize) -> Self {
        Version { major, minor }
    }
}

/// Only plain ascii digits are accepted, `usize::from_str` alone would also take a leading `+`.
fn parse_component(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError {
            input: s.to_owned(),
        };

        let (major, minor) = s.split_once('.').ok_or_else(err)?;

        Ok(Version {
            major: parse_component(major).ok_or_else(err)?,
            minor: parse_component(minor).ok_or_else(err)?,
        })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_major_minor() {
        assert_eq!("30.0".parse::<Version>().unwrap(), Version::new(30, 0));
        assert_eq!("1.10".parse::<Version>().unwrap(), Version::new(1, 10));
    }

    #[test]
    fn test_rejects_malformed_versions() {
        for input in [
            "",
            "30",
            "30.",
            ".0",
            "30.0.1",
            "not-a-version",
            " 30.0",
            "30.0\n",
            "+30.0",
            "-1.0",
            "a.b",
        ] {
            assert!(
                input.parse::<Version>().is_err(),
                "expected `{}` to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_display_matches_input() {
        let v: Version = "27.1".parse().unwrap();
        assert_eq!(v.to_string(), "27.1");
    }

    #[test]
    fn test_ordering_is_major_then_minor() {
        assert!(Version::new(1, 9) < Version::new(2, 0));
        assert!(Version::new(2, 1) > Version::new(2, 0));
    }

    #[test]
    fn test_error_names_offending_input() {
        let err = "nope".parse::<Version>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "`nope` is not a valid `<major>.<minor>` version"
        );
    }
}
