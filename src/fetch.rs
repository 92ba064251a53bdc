//! Count, plan and fetch every page of a query against one engine.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::pagination;
use crate::request::{self, PageRequest};
use crate::transport::{Session, Transport, TransportConfig};
use crate::{Engine, FetchResult, IdentitySet, JixerError, Result};

/// Longest query prefix written to the logs.
const LOG_QUERY_CHARS: usize = 100;

/// Stages of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    CountRequested,
    EmptyShortCircuit,
    Planning,
    PagesInFlight,
    Normalizing,
    Done,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CountRequested => "count-requested",
            Self::EmptyShortCircuit => "empty",
            Self::Planning => "planning",
            Self::PagesInFlight => "pages-in-flight",
            Self::Normalizing => "normalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Drives one engine through count lookup, page planning and page fetches.
///
/// Pages are requested one after another in cursor order. A failed page is
/// logged and skipped; a failed count lookup yields an empty result.
#[derive(Clone)]
pub struct Fetcher {
    engine: Arc<dyn Engine>,
    transport: Transport,
}

impl Fetcher {
    /// Creates a fetcher, rejecting engines with an incomplete profile.
    pub fn new<E: Engine + 'static>(engine: E) -> Result<Self> {
        Self::from_arc(Arc::new(engine))
    }

    /// Creates a fetcher from a shared engine.
    pub fn from_arc(engine: Arc<dyn Engine>) -> Result<Self> {
        engine.profile().validate()?;
        Ok(Self {
            engine,
            transport: Transport::default(),
        })
    }

    /// Replaces the transport settings.
    pub fn with_transport(mut self, config: TransportConfig) -> Self {
        self.transport = Transport::new(config);
        self
    }

    /// Returns the engine.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Returns the engine name.
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Total result count, or the lookup error.
    pub async fn try_total_count(&self, query: &str) -> Result<u64> {
        let session = self.transport.open()?;
        self.count_with(&session, query).await
    }

    /// Total result count; lookup failures are logged and reported as 0.
    ///
    /// A failed lookup and a query without results look the same here;
    /// use [`Fetcher::try_total_count`] to tell them apart.
    pub async fn total_count(&self, query: &str) -> u64 {
        match self.try_total_count(query).await {
            Ok(total) => total,
            Err(e) => {
                error!("{}: count lookup failed: {}", self.name(), e);
                0
            }
        }
    }

    /// Builds the page requests for a query with `total_count` results.
    pub fn plan_requests(&self, query: &str, total_count: u64) -> Result<Vec<PageRequest>> {
        let profile = self.engine.profile();
        let cursors = pagination::plan(total_count, profile);
        request::build_all(query, profile, &cursors)
    }

    /// Fetches the raw items of every planned page.
    pub async fn fetch_raw(&self, query: &str) -> FetchResult {
        let mut state = FetchState::Idle;
        let result = self.run(query, &mut state).await;
        if state != FetchState::EmptyShortCircuit {
            self.transition(&mut state, FetchState::Done);
        }
        result
    }

    /// Fetches every page and normalizes the items into identities.
    pub async fn fetch_all(&self, query: &str) -> IdentitySet {
        let mut state = FetchState::Idle;
        let raw = self.run(query, &mut state).await;
        if state == FetchState::EmptyShortCircuit {
            return IdentitySet::new();
        }
        self.transition(&mut state, FetchState::Normalizing);
        let identities = self.engine.normalize(&raw.items);
        self.transition(&mut state, FetchState::Done);
        identities
    }

    async fn run(&self, query: &str, state: &mut FetchState) -> FetchResult {
        let session = match self.transport.open() {
            Ok(session) => session,
            Err(e) => {
                error!("{}: failed to open session: {}", self.name(), e);
                return FetchResult::default();
            }
        };

        self.transition(state, FetchState::CountRequested);
        let total_count = match self.count_with(&session, query).await {
            Ok(total) => total,
            Err(e) => {
                error!("{}: count lookup failed: {}", self.name(), e);
                0
            }
        };
        let mut result = FetchResult {
            total_count,
            ..Default::default()
        };
        if total_count == 0 {
            self.transition(state, FetchState::EmptyShortCircuit);
            return result;
        }

        self.transition(state, FetchState::Planning);
        let pages = match self.plan_requests(query, total_count) {
            Ok(pages) => pages,
            Err(e) => {
                error!("{}: failed to build page requests: {}", self.name(), e);
                return result;
            }
        };
        result.pages_planned = pages.len();

        self.transition(state, FetchState::PagesInFlight);
        let short_query = truncate(query, LOG_QUERY_CHARS);
        for (n, page) in pages.iter().enumerate() {
            info!(
                "{}: getting page {} out of {} for query: {}",
                self.name(),
                n + 1,
                pages.len(),
                short_query
            );
            match self.fetch_page(&session, page).await {
                Ok(items) => result.items.extend(items),
                Err(e) => {
                    error!("{}: page {} failed: {}", self.name(), n + 1, e);
                    result.pages_failed += 1;
                }
            }
        }
        debug!(
            "{}: {} items from {}/{} pages",
            self.name(),
            result.items.len(),
            result.pages_succeeded(),
            result.pages_planned
        );
        result
    }

    async fn count_with(&self, session: &Session, query: &str) -> Result<u64> {
        let profile = self.engine.profile();
        info!(
            "{}: getting the number of hosts for query: {}",
            self.name(),
            truncate(query, LOG_QUERY_CHARS)
        );
        let request = request::build_count(query, profile)?;
        let body = session.execute(&request).await?;
        let total = read_count(&body, &profile.count_field)?;
        info!("{}: {} hosts match the query", self.name(), total);
        Ok(total)
    }

    async fn fetch_page(&self, session: &Session, page: &PageRequest) -> Result<Vec<Value>> {
        let body = session.execute(page).await?;
        read_items(body, &self.engine.profile().results_field)
    }

    fn transition(&self, state: &mut FetchState, next: FetchState) {
        debug!("{}: {} -> {}", self.name(), state, next);
        *state = next;
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("engine", &self.name())
            .field("transport", &self.transport)
            .finish()
    }
}

/// Reads a non-negative count; numeric strings are accepted.
fn read_count(body: &Value, field: &str) -> Result<u64> {
    let value = body
        .get(field)
        .ok_or_else(|| JixerError::Decode(format!("missing count field '{}'", field)))?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| JixerError::Decode(format!("count field '{}' is not a count: {}", field, value)))
}

/// Takes the result list out of a page body. `null` counts as an empty page.
fn read_items(mut body: Value, field: &str) -> Result<Vec<Value>> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(JixerError::Decode(format!(
            "results field '{}' is not a list: {}",
            field,
            truncate(&other.to_string(), LOG_QUERY_CHARS)
        ))),
        None => Err(JixerError::Decode(format!("missing results field '{}'", field))),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{Fofa, Netlas, Shodan};
    use crate::EngineProfile;
    use serde_json::json;

    struct Broken {
        profile: EngineProfile,
    }

    impl Engine for Broken {
        fn profile(&self) -> &EngineProfile {
            &self.profile
        }

        fn normalize(&self, _items: &[Value]) -> IdentitySet {
            IdentitySet::new()
        }
    }

    #[test]
    fn test_new_rejects_incomplete_profile() {
        let engine = Broken {
            profile: EngineProfile {
                name: "Broken".to_string(),
                base_url: "https://example.com/".to_string(),
                count_endpoint: "count".to_string(),
                search_endpoint: "search".to_string(),
                query_param: "q".to_string(),
                ..Default::default()
            },
        };
        let err = Fetcher::new(engine).unwrap_err();
        assert!(matches!(err, JixerError::Configuration(_)));
    }

    #[test]
    fn test_plan_requests_page_index() {
        let fetcher = Fetcher::new(Shodan::new("key")).unwrap();
        let pages = fetcher.plan_requests("port:22", 250).unwrap();
        let cursors: Vec<_> = pages.iter().map(|p| p.param("page").unwrap()).collect();
        assert_eq!(cursors, vec!["1", "2", "3"]);
        assert!(pages.iter().all(|p| p.param("key") == Some("key")));
    }

    #[test]
    fn test_plan_requests_offset() {
        let fetcher = Fetcher::new(Netlas::new("key")).unwrap();
        let pages = fetcher.plan_requests("port:22", 45).unwrap();
        let cursors: Vec<_> = pages.iter().map(|p| p.cursor().unwrap()).collect();
        assert_eq!(cursors, vec![0, 20, 40]);
    }

    #[test]
    fn test_plan_requests_zero_total() {
        let fetcher = Fetcher::new(Fofa::new("key", "me@example.com")).unwrap();
        assert!(fetcher.plan_requests("port:22", 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_count() {
        assert_eq!(read_count(&json!({"total": 45}), "total").unwrap(), 45);
        assert_eq!(read_count(&json!({"size": "12"}), "size").unwrap(), 12);
        assert!(read_count(&json!({"total": -1}), "total").is_err());
        assert!(read_count(&json!({"count": 1}), "total").unwrap_err().is_decode());
    }

    #[test]
    fn test_read_items() {
        let items = read_items(json!({"matches": [{"ip_str": "1.1.1.1"}]}), "matches").unwrap();
        assert_eq!(items.len(), 1);
        assert!(read_items(json!({"matches": []}), "matches").unwrap().is_empty());
        assert!(read_items(json!({"matches": null}), "matches").unwrap().is_empty());
        assert!(read_items(json!({"matches": 3}), "matches").is_err());
        assert!(read_items(json!({"error": "x"}), "matches").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 100), "short");
        let long = "a".repeat(150);
        assert_eq!(truncate(&long, 100).len(), 100);
        let wide = "é".repeat(150);
        assert_eq!(truncate(&wide, 100).chars().count(), 100);
    }

    #[test]
    fn test_fetch_state_display() {
        assert_eq!(FetchState::EmptyShortCircuit.to_string(), "empty");
        assert_eq!(FetchState::PagesInFlight.to_string(), "pages-in-flight");
    }

    #[test]
    fn test_fetcher_debug() {
        let fetcher = Fetcher::new(Shodan::new("key")).unwrap();
        let debug = format!("{:?}", fetcher);
        assert!(debug.contains("Shodan"));
    }
}
