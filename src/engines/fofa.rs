//! FOFA host search.

use serde_json::Value;

use crate::engine::{Engine, EngineProfile, PageStyle, QueryEncoding};
use crate::result::normalize_at;
use crate::IdentitySet;

const BASE_URL: &str = "https://fofa.info/api/v1/";
const RESULTS_PER_PAGE: u64 = 1000;

/// FOFA engine.
///
/// Queries are sent Base64-encoded as `qbase64`. Result items are arrays in
/// the order of the default `host,ip,port` field list, so the IP sits at index 1.
pub struct Fofa {
    profile: EngineProfile,
}

impl Fofa {
    /// Creates a FOFA engine for the given API key and account email.
    pub fn new(api_key: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            profile: EngineProfile {
                name: "FOFA".to_string(),
                base_url: BASE_URL.to_string(),
                count_endpoint: "search/all".to_string(),
                search_endpoint: "search/all".to_string(),
                query_param: "qbase64".to_string(),
                page_param: "page".to_string(),
                count_field: "size".to_string(),
                results_field: "results".to_string(),
                results_per_page: RESULTS_PER_PAGE,
                page_style: PageStyle::PageIndex,
                query_encoding: QueryEncoding::Base64,
                ..Default::default()
            }
            .with_param("email", email)
            .with_param("key", api_key)
            .with_param("size", RESULTS_PER_PAGE.to_string()),
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

impl Engine for Fofa {
    fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    fn normalize(&self, items: &[Value]) -> IdentitySet {
        normalize_at(items, "/1")
    }
}
