use std::{fmt, num::NonZeroU64, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::Config;

/// A value of the global catalog counter.
///
/// Counter values start at one and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogNumber(NonZeroU64);

impl CatalogNumber {
    /// Wraps a non-zero counter value.
    #[must_use]
    pub const fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns a displayable representation using the configured prefix,
    /// separator and digit width.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroU64;
    ///
    /// use req_catalog::{CatalogNumber, Config};
    ///
    /// let config = Config::new("RQ", 5, "-").unwrap();
    /// let number = CatalogNumber::new(NonZeroU64::new(42).unwrap());
    ///
    /// assert_eq!(number.display(&config).to_string(), "RQ-00042");
    /// ```
    #[must_use]
    pub const fn display(self, config: &Config) -> FormattedCatalogNumber<'_> {
        FormattedCatalogNumber {
            number: self,
            config,
        }
    }

    /// Formats this counter value into a [`CatalogId`].
    #[must_use]
    pub fn to_catalog_id(self, config: &Config) -> CatalogId {
        CatalogId {
            formatted: self.display(config).to_string(),
            number: self,
        }
    }
}

/// A wrapper type that formats a counter value with the catalog settings.
///
/// This type is returned by [`CatalogNumber::display`].
#[derive(Debug, Clone, Copy)]
pub struct FormattedCatalogNumber<'a> {
    number: CatalogNumber,
    config: &'a Config,
}

impl fmt::Display for FormattedCatalogNumber<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{:0width$}",
            self.config.prefix(),
            self.config.separator(),
            self.number.get(),
            width = self.config.digits()
        )
    }
}

/// A formatted, globally unique catalog identifier such as `RQ-00042`.
///
/// Catalog ids order by their counter value, so ids allocated later always
/// compare greater.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogId {
    formatted: String,
    number: CatalogNumber,
}

impl CatalogId {
    /// The counter value this id was formatted from.
    #[must_use]
    pub const fn number(&self) -> CatalogNumber {
        self.number
    }

    /// The formatted id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.formatted
    }
}

impl PartialOrd for CatalogId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CatalogId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.formatted.cmp(&other.formatted))
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

/// Error returned when a string does not end in a non-zero counter value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid catalog id '{0}': expected a prefix followed by a non-zero number")]
pub struct InvalidCatalogIdError(String);

impl FromStr for CatalogId {
    type Err = InvalidCatalogIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits_start = s
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)
            .ok_or_else(|| InvalidCatalogIdError(s.to_string()))?;

        let number = s[digits_start..]
            .parse::<u64>()
            .ok()
            .and_then(NonZeroU64::new)
            .ok_or_else(|| InvalidCatalogIdError(s.to_string()))?;

        Ok(Self {
            formatted: s.to_string(),
            number: CatalogNumber::new(number),
        })
    }
}

impl Serialize for CatalogId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted)
    }
}

impl<'de> Deserialize<'de> for CatalogId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
