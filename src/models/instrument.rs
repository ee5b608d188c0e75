//! Instrument identifiers and the configured watch set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ticker symbol as understood by the price provider, e.g. `^IXIC` or `XAUUSD=X`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Returns `None` for blank identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

/// Deduplicated union of the configured instrument groups.
pub fn instrument_set<'a, I>(groups: I) -> BTreeSet<Instrument>
where
    I: IntoIterator<Item = &'a [String]>,
{
    groups
        .into_iter()
        .flat_map(|group| group.iter())
        .filter_map(|raw| Instrument::parse(raw))
        .collect()
}
