use std::{fmt, num::NonZeroUsize, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The position of an item in its document's header hierarchy.
///
/// Header items occupy the top level (`1`, `2`, ...). Normal items sit
/// beneath exactly one header (`1.1`, `1.2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A top-level header position.
    Header(NonZeroUsize),
    /// A position beneath a header.
    Item {
        /// 1-based position of the governing header.
        header: NonZeroUsize,
        /// 1-based position of the item beneath its header.
        sequence: NonZeroUsize,
    },
}

impl Level {
    /// The 1-based top-level segment.
    #[must_use]
    pub const fn header(self) -> NonZeroUsize {
        match self {
            Self::Header(header) | Self::Item { header, .. } => header,
        }
    }

    /// The position beneath the header, or `None` for header levels.
    #[must_use]
    pub const fn sequence(self) -> Option<NonZeroUsize> {
        match self {
            Self::Header(_) => None,
            Self::Item { sequence, .. } => Some(sequence),
        }
    }

    /// Returns `true` for header positions.
    #[must_use]
    pub const fn is_header(self) -> bool {
        matches!(self, Self::Header(_))
    }

    /// The level in the form outline-numbered engines use for headings, where
    /// a trailing `.0` marks a heading (`2` becomes `2.0`).
    #[must_use]
    pub fn heading_form(self) -> String {
        match self {
            Self::Header(header) => format!("{header}.0"),
            Self::Item { .. } => self.to_string(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Header(header) => write!(f, "{header}"),
            Self::Item { header, sequence } => write!(f, "{header}.{sequence}"),
        }
    }
}

/// Error returned when a string is not a valid level.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid level '{0}': expected 'H' or 'H.K' with non-zero integers")]
pub struct InvalidLevelError(String);

impl FromStr for Level {
    type Err = InvalidLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidLevelError(s.to_string());
        let segment = |part: &str| {
            part.parse::<usize>()
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(invalid)
        };

        match s.split_once('.') {
            None => Ok(Self::Header(segment(s)?)),
            // Headings written as 'N.0'.
            Some((header, "0")) => Ok(Self::Header(segment(header)?)),
            Some((header, sequence)) => Ok(Self::Item {
                header: segment(header)?,
                sequence: segment(sequence)?,
            }),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
