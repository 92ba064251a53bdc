//! Netlas host search.

use serde_json::Value;

use crate::engine::{Engine, EngineProfile, PageStyle};
use crate::result::normalize_at;
use crate::IdentitySet;

const BASE_URL: &str = "https://app.netlas.io/api/";

/// Netlas engine. Pages by item offset and authenticates with `X-API-Key`.
pub struct Netlas {
    profile: EngineProfile,
}

impl Netlas {
    /// Creates a Netlas engine for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            profile: EngineProfile {
                name: "Netlas".to_string(),
                base_url: BASE_URL.to_string(),
                count_endpoint: "responses_count".to_string(),
                search_endpoint: "responses".to_string(),
                query_param: "q".to_string(),
                page_param: "start".to_string(),
                count_field: "count".to_string(),
                results_field: "items".to_string(),
                results_per_page: 20,
                page_style: PageStyle::Offset,
                ..Default::default()
            }
            .with_param("source_type", "include")
            .with_param("fields", "ip")
            .with_header("X-API-Key", api_key),
        }
    }

    /// Sends requests to another base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.profile = self.profile.with_base_url(base_url);
        self
    }

    /// Caps the number of pages fetched per query.
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.profile = self.profile.with_max_pages(max_pages);
        self
    }
}

impl Engine for Netlas {
    fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    fn normalize(&self, items: &[Value]) -> IdentitySet {
        normalize_at(items, "/data/ip")
    }
}
