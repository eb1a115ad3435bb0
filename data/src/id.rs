use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DataError, DataResult};

/// Manager-unique identifier of a data provider.
///
/// Ids handed out by a manager are sequential (`DPID0000`, `DPID0001`, ...);
/// ids restored from a document may be any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    /// Prefix of sequentially assigned ids.
    pub const PREFIX: &'static str = "DPID";

    /// Creates an id from a string. Fails on an empty string.
    pub fn new(id: impl Into<String>) -> DataResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DataError::MissingArgument("provider id"));
        }
        Ok(Self(id))
    }

    /// Returns the `n`-th sequential id.
    pub fn sequential(n: u64) -> Self {
        Self(format!("{}{:04}", Self::PREFIX, n))
    }

    /// Returns the index of a sequential id, if this is one.
    pub fn sequence_index(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential() {
        assert_eq!(ProviderId::sequential(0).as_str(), "DPID0000");
        assert_eq!(ProviderId::sequential(42).as_str(), "DPID0042");
        assert_eq!(ProviderId::sequential(12345).as_str(), "DPID12345");
    }

    #[test]
    fn test_sequence_index() {
        assert_eq!(ProviderId::sequential(7).sequence_index(), Some(7));
        assert_eq!(ProviderId::new("custom").unwrap().sequence_index(), None);
        assert_eq!(ProviderId::new("DPIDxyz").unwrap().sequence_index(), None);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            ProviderId::new(""),
            Err(DataError::MissingArgument(_))
        ));
        assert!("  ".parse::<ProviderId>().is_err());
    }
}
