//! Local version record and the release-time odometer bump

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest value a minor or patch segment holds before carrying
const SEGMENT_MAX: u32 = 9;

/// A `major.minor.patch` triple as stored in a component's version file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRecord {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionRecord {
    /// Version assumed when a version file is absent
    pub const ZERO: VersionRecord = VersionRecord::new(0, 0, 0);

    /// Version assumed when a version file exists but cannot be parsed
    pub const INITIAL: VersionRecord = VersionRecord::new(1, 0, 0);

    /// Creates a new VersionRecord
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version, falling back to `1.0.0` on empty or malformed input
    pub fn parse_or_initial(s: &str) -> Self {
        s.parse().unwrap_or(Self::INITIAL)
    }

    /// Odometer increment: patch and minor roll over at 9 and carry left.
    ///
    /// `1.2.3 -> 1.2.4`, `1.2.9 -> 1.3.0`, `1.9.9 -> 2.0.0`, `9.9.9 -> 10.0.0`.
    /// The major segment never rolls over; `None` when it would exceed `u32`.
    pub fn bump(self) -> Option<Self> {
        if self.patch < SEGMENT_MAX {
            return Some(Self::new(self.major, self.minor, self.patch + 1));
        }
        if self.minor < SEGMENT_MAX {
            return Some(Self::new(self.major, self.minor + 1, 0));
        }
        self.major.checked_add(1).map(|major| Self::new(major, 0, 0))
    }
}

impl Default for VersionRecord {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a string is not a `major.minor.patch` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError {
    input: String,
}

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a major.minor.patch version", self.input)
    }
}

impl std::error::Error for ParseVersionError {}

impl FromStr for VersionRecord {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };

        let mut segments = s.trim().split('.');
        let mut next = || -> Result<u32, ParseVersionError> {
            let segment = segments.next().ok_or_else(err)?;
            // u32::from_str accepts a leading '+', which is not part of the format
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            segment.parse().map_err(|_| err())
        };

        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        if segments.next().is_some() {
            return Err(err());
        }

        Ok(Self::new(major, minor, patch))
    }
}
