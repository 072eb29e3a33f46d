use std::fmt;
use std::str::FromStr;

use crate::DecodeError;

/// A Slippi protocol version, e.g. `3.14.0`.
///
/// Ordering is component-wise (major, then minor, then build), which is what the
/// derive gives us given the field order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, build: u8) -> Self {
        Self { major, minor, build }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

impl FromStr for Version {
    type Err = DecodeError;

    /// Parses `major.minor.build`. Exactly three components are required.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DecodeError::Malformed(format!("version {s:?}: {e}")))?;

        match parts.as_slice() {
            [major, minor, build] => Ok(Self::new(*major, *minor, *build)),
            _ => Err(DecodeError::Malformed(format!("version {s:?} must have three components"))),
        }
    }
}
