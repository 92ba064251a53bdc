//! Request construction for count and search calls.

use std::collections::BTreeMap;

use reqwest::Method;
use url::Url;

use crate::engine::EngineProfile;
use crate::Result;

/// A fully bound HTTP request for one call to an engine.
///
/// Each request owns its parameters and headers; nothing is shared between pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    method: Method,
    endpoint: Url,
    params: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    cursor: Option<u64>,
}

impl PageRequest {
    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint URL without query parameters.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query parameters.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Value of one query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Headers.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Page cursor, `None` for count requests.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Endpoint URL with the query string attached.
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        url
    }
}

fn base_params(query: &str, profile: &EngineProfile) -> BTreeMap<String, String> {
    let mut params = profile.default_params.clone();
    params.insert(profile.query_param.clone(), profile.encode_query(query));
    params
}

/// Builds the request for the count endpoint.
pub fn build_count(query: &str, profile: &EngineProfile) -> Result<PageRequest> {
    Ok(PageRequest {
        method: Method::GET,
        endpoint: profile.count_url()?,
        params: base_params(query, profile),
        headers: profile.headers.clone(),
        cursor: None,
    })
}

/// Builds the search request for one page cursor.
pub fn build(query: &str, profile: &EngineProfile, cursor: u64) -> Result<PageRequest> {
    let mut params = base_params(query, profile);
    params.insert(profile.page_param.clone(), cursor.to_string());
    Ok(PageRequest {
        method: Method::GET,
        endpoint: profile.search_url()?,
        params,
        headers: profile.headers.clone(),
        cursor: Some(cursor),
    })
}

/// Builds one search request per cursor, in cursor order.
pub fn build_all(query: &str, profile: &EngineProfile, cursors: &[u64]) -> Result<Vec<PageRequest>> {
    cursors
        .iter()
        .map(|&cursor| build(query, profile, cursor))
        .collect()
}
