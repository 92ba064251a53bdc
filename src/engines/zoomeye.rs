//! ZoomEye host search.

use serde_json::Value;

use crate::engine::{Engine, EngineProfile, PageStyle};
use crate::result::normalize_at;
use crate::IdentitySet;

const BASE_URL: &str = "https://api.zoomeye.org/host/";

/// ZoomEye engine. Count and search share the `search` endpoint.
pub struct Zoomeye {
    profile: EngineProfile,
}

impl Zoomeye {
    /// Creates a ZoomEye engine for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            profile: EngineProfile {
                name: "ZoomEye".to_string(),
                base_url: BASE_URL.to_string(),
                count_endpoint: "search".to_string(),
                search_endpoint: "search".to_string(),
                query_param: "query".to_string(),
                page_param: "page".to_string(),
                count_field: "total".to_string(),
                results_field: "matches".to_string(),
                results_per_page: 20,
                page_style: PageStyle::PageIndex,
                ..Default::default()
            }
            .with_header("API-KEY", api_key),
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

impl Engine for Zoomeye {
    fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    fn normalize(&self, items: &[Value]) -> IdentitySet {
        normalize_at(items, "/ip")
    }
}
