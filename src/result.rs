//! Identity records and fetch results.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A host identity as reported by a search engine.
///
/// Either part may be missing when the provider omits it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// IP address as reported by the provider.
    pub ip: Option<String>,
    /// Domain or hostname, when the engine reports one.
    pub domain: Option<String>,
}

impl IdentityRecord {
    /// Creates a record with an IP and no domain.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            domain: None,
        }
    }

    /// Sets the domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Extracts a record from one item, reading the IP at a JSON pointer.
    ///
    /// Non-string or missing values leave the IP empty.
    pub fn from_pointer(item: &Value, ip_pointer: &str) -> Self {
        Self {
            ip: item
                .pointer(ip_pointer)
                .and_then(Value::as_str)
                .map(str::to_owned),
            domain: None,
        }
    }
}

impl fmt::Display for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = self.ip.as_deref().unwrap_or("-");
        match &self.domain {
            Some(domain) => write!(f, "{}\t{}", ip, domain),
            None => f.write_str(ip),
        }
    }
}

/// Unordered, de-duplicated set of identities.
pub type IdentitySet = HashSet<IdentityRecord>;

/// Normalizes items by reading the IP at one JSON pointer in each.
pub fn normalize_at(items: &[Value], ip_pointer: &str) -> IdentitySet {
    items
        .iter()
        .map(|item| IdentityRecord::from_pointer(item, ip_pointer))
        .collect()
}

/// Raw items gathered across the pages of one query.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// Items in page order, then provider order within a page.
    pub items: Vec<Value>,
    /// Total count the engine reported.
    pub total_count: u64,
    /// Pages planned after applying the page cap.
    pub pages_planned: usize,
    /// Pages whose request or decoding failed.
    pub pages_failed: usize,
}

impl FetchResult {
    /// Returns whether no items were gathered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns whether any planned page was skipped.
    pub fn is_partial(&self) -> bool {
        self.pages_failed > 0
    }

    /// Pages that were fetched and decoded.
    pub fn pages_succeeded(&self) -> usize {
        self.pages_planned - self.pages_failed
    }
}

/// Identity sets for one query across several engines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    engines: BTreeMap<String, IdentitySet>,
    /// Search duration in milliseconds.
    pub duration_ms: u64,
}

impl SearchResults {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identities one engine returned.
    pub fn insert(&mut self, engine: impl Into<String>, identities: IdentitySet) {
        self.engines.insert(engine.into(), identities);
    }

    /// Identities returned by one engine.
    pub fn engine(&self, name: &str) -> Option<&IdentitySet> {
        self.engines.get(name)
    }

    /// Iterates over engines and their identities, sorted by engine name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdentitySet)> {
        self.engines.iter().map(|(name, set)| (name.as_str(), set))
    }

    /// Union of all engines' identities.
    pub fn union(&self) -> IdentitySet {
        self.engines.values().flatten().cloned().collect()
    }

    /// Number of engines that answered.
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Sets the search duration.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }
}
