//! Host search engine trait and declarative profiles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{IdentitySet, JixerError, Result};

/// Shared ceiling on the number of pages fetched for one query.
pub const DEFAULT_MAX_PAGES: u64 = 2500;

/// Page size used when an engine does not override it.
pub const DEFAULT_RESULTS_PER_PAGE: u64 = 100;

/// Application-level retry budget.
///
/// Not consulted: only the transport retries, and only transient statuses.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// How an engine selects a page of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStyle {
    /// 1-based page numbers.
    #[default]
    PageIndex,
    /// 0-based item offsets in steps of the page size.
    Offset,
}

/// Transform applied to the query before it is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEncoding {
    /// Sent as written.
    #[default]
    Plain,
    /// Standard (padded) Base64 of the UTF-8 bytes.
    Base64,
}

impl QueryEncoding {
    /// Encodes a query string.
    pub fn encode(self, query: &str) -> String {
        match self {
            Self::Plain => query.to_string(),
            Self::Base64 => STANDARD.encode(query.as_bytes()),
        }
    }
}

/// Declarative description of one engine's HTTP API.
///
/// Built once per engine and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineProfile {
    /// Display name of the engine.
    pub name: String,
    /// Base URL the endpoints are joined onto. Should end with `/`.
    pub base_url: String,
    /// Count endpoint, relative to `base_url`.
    pub count_endpoint: String,
    /// Search endpoint, relative to `base_url`.
    pub search_endpoint: String,
    /// Query parameters sent with every request.
    #[serde(default)]
    pub default_params: BTreeMap<String, String>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query string parameter carrying the search query.
    pub query_param: String,
    /// Query string parameter carrying the page cursor.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Top-level response field holding the total count.
    pub count_field: String,
    /// Top-level response field holding the result items.
    pub results_field: String,
    /// Items per page as served by the provider.
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u64,
    /// Hard cap on pages fetched for one query.
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
    /// Cursor style.
    #[serde(default)]
    pub page_style: PageStyle,
    /// Query transform.
    #[serde(default)]
    pub query_encoding: QueryEncoding,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_results_per_page() -> u64 {
    DEFAULT_RESULTS_PER_PAGE
}

fn default_max_pages() -> u64 {
    DEFAULT_MAX_PAGES
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            count_endpoint: String::new(),
            search_endpoint: String::new(),
            default_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            query_param: String::new(),
            page_param: default_page_param(),
            count_field: String::new(),
            results_field: String::new(),
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
            page_style: PageStyle::PageIndex,
            query_encoding: QueryEncoding::Plain,
        }
    }
}

impl EngineProfile {
    /// Points the profile at another base URL, keeping endpoint paths.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Sets the page cap.
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Sets the page size.
    pub fn with_results_per_page(mut self, results_per_page: u64) -> Self {
        self.results_per_page = results_per_page;
        self
    }

    /// Adds or replaces a default query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_params.insert(key.into(), value.into());
        self
    }

    /// Adds or replaces a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Absolute URL of the count endpoint.
    pub fn count_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?.join(&self.count_endpoint)?)
    }

    /// Absolute URL of the search endpoint.
    pub fn search_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?.join(&self.search_endpoint)?)
    }

    /// Applies the configured query transform.
    pub fn encode_query(&self, query: &str) -> String {
        self.query_encoding.encode(query)
    }

    /// Checks that every field needed to build requests and read responses is set.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("base URL", &self.base_url),
            ("count endpoint", &self.count_endpoint),
            ("search endpoint", &self.search_endpoint),
            ("query parameter", &self.query_param),
            ("page parameter", &self.page_param),
            ("count field", &self.count_field),
            ("results field", &self.results_field),
        ];
        for (what, value) in required {
            if value.trim().is_empty() {
                return Err(JixerError::Configuration(format!(
                    "{} has an empty {}",
                    self.display_name(),
                    what
                )));
            }
        }
        if self.results_per_page == 0 {
            return Err(JixerError::Configuration(format!(
                "{} has results_per_page = 0",
                self.display_name()
            )));
        }
        if self.max_pages == 0 {
            return Err(JixerError::Configuration(format!(
                "{} has max_pages = 0",
                self.display_name()
            )));
        }
        for url in [self.count_url(), self.search_url()] {
            url.map_err(|e| {
                JixerError::Configuration(format!("{}: {}", self.display_name(), e))
            })?;
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "engine profile"
        } else {
            &self.name
        }
    }
}

/// Trait for host search engines.
///
/// An engine supplies its profile and knows the shape of its result items.
/// Everything else (counting, paging, retries) is driven by [`crate::Fetcher`].
pub trait Engine: Send + Sync {
    /// Returns the engine profile.
    fn profile(&self) -> &EngineProfile;

    /// Extracts identity records from raw result items.
    ///
    /// Items missing the IP field still yield a record; they never fail the batch.
    fn normalize(&self, items: &[Value]) -> IdentitySet;

    /// Returns the engine name.
    fn name(&self) -> &str {
        &self.profile().name
    }
}

/// The closed set of supported engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Shodan,
    Netlas,
    Zoomeye,
    Fofa,
}

impl EngineKind {
    /// All engines, in display order.
    pub const ALL: [EngineKind; 4] = [Self::Shodan, Self::Netlas, Self::Zoomeye, Self::Fofa];

    /// Lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shodan => "shodan",
            Self::Netlas => "netlas",
            Self::Zoomeye => "zoomeye",
            Self::Fofa => "fofa",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = JixerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shodan" => Ok(Self::Shodan),
            "netlas" => Ok(Self::Netlas),
            "zoomeye" | "zoom" => Ok(Self::Zoomeye),
            "fofa" => Ok(Self::Fofa),
            other => Err(JixerError::Configuration(format!("unknown engine '{}'", other))),
        }
    }
}
