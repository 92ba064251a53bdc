//! Shodan host search.

use serde_json::Value;

use crate::engine::{Engine, EngineProfile, PageStyle, QueryEncoding};
use crate::{IdentityRecord, IdentitySet};

const BASE_URL: &str = "https://api.shodan.io/shodan/host/";

/// Shodan engine. The API key travels as the `key` query parameter.
pub struct Shodan {
    profile: EngineProfile,
}

impl Shodan {
    /// Creates a Shodan engine for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            profile: EngineProfile {
                name: "Shodan".to_string(),
                base_url: BASE_URL.to_string(),
                count_endpoint: "count".to_string(),
                search_endpoint: "search".to_string(),
                query_param: "query".to_string(),
                page_param: "page".to_string(),
                count_field: "total".to_string(),
                results_field: "matches".to_string(),
                results_per_page: 100,
                page_style: PageStyle::PageIndex,
                query_encoding: QueryEncoding::Plain,
                ..Default::default()
            }
            .with_param("key", api_key),
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

impl Engine for Shodan {
    fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    fn normalize(&self, items: &[Value]) -> IdentitySet {
        items
            .iter()
            .map(|item| {
                let record = IdentityRecord::from_pointer(item, "/ip_str");
                // first hostname only
                match item.pointer("/hostnames/0").and_then(Value::as_str) {
                    Some(hostname) => record.with_domain(hostname),
                    None => record,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shodan_profile() {
        let engine = Shodan::new("k");
        let profile = engine.profile();
        assert_eq!(engine.name(), "Shodan");
        assert_eq!(
            profile.count_url().unwrap().as_str(),
            "https://api.shodan.io/shodan/host/count"
        );
        assert_eq!(
            profile.search_url().unwrap().as_str(),
            "https://api.shodan.io/shodan/host/search"
        );
        assert_eq!(profile.default_params.get("key").unwrap(), "k");
        assert!(profile.headers.is_empty());
        assert_eq!(profile.results_per_page, 100);
        assert_eq!(profile.max_pages, 2500);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_shodan_normalize() {
        let items = vec![
            json!({"ip_str": "8.8.8.8", "port": 53}),
            json!({"ip_str": "8.8.8.8", "port": 443}),
            json!({"ip_str": "1.1.1.1"}),
        ];
        let set = Shodan::new("k").normalize(&items);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&IdentityRecord::new("8.8.8.8")));
        assert!(set.contains(&IdentityRecord::new("1.1.1.1")));
    }

    #[test]
    fn test_shodan_normalize_hostnames() {
        let items = vec![
            json!({"ip_str": "1.1.1.1", "hostnames": ["one.one.one.one", "1dot1dot1dot1.cloudflare-dns.com"]}),
            json!({"ip_str": "8.8.8.8"}),
            json!({"ip_str": "9.9.9.9", "hostnames": []}),
        ];
        let set = Shodan::new("k").normalize(&items);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&IdentityRecord::new("1.1.1.1").with_domain("one.one.one.one")));
        assert!(set.contains(&IdentityRecord::new("8.8.8.8")));
        assert!(set.contains(&IdentityRecord::new("9.9.9.9")));
    }

    #[test]
    fn test_shodan_normalize_missing_ip() {
        let items = vec![json!({"port": 22}), json!({"ip_str": "9.9.9.9"})];
        let set = Shodan::new("k").normalize(&items);
        assert_eq!(set.len(), 2);
        assert!(set.iter().any(|r| r.ip.is_none()));
    }

    #[test]
    fn test_shodan_with_base_url() {
        let engine = Shodan::new("k").with_base_url("http://127.0.0.1:9000/shodan/host");
        assert_eq!(
            engine.profile().count_url().unwrap().as_str(),
            "http://127.0.0.1:9000/shodan/host/count"
        );
    }

    #[test]
    fn test_shodan_with_max_pages() {
        assert_eq!(Shodan::new("k").with_max_pages(3).profile().max_pages, 3);
    }
}
