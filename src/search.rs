//! Search orchestration across several engines.

use std::time::Instant;

use futures::future::join_all;
use tracing::debug;

use crate::transport::TransportConfig;
use crate::{Engine, Fetcher, JixerError, Result, SearchResults};

/// Runs one query against several engines.
///
/// Engines run concurrently since each owns its own session; pages within an
/// engine are still fetched one at a time.
#[derive(Debug, Default)]
pub struct Search {
    fetchers: Vec<Fetcher>,
    transport: TransportConfig,
}

impl Search {
    /// Creates a search without engines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport used by engines added afterwards.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Adds an engine, validating its profile.
    pub fn add_engine<E: Engine + 'static>(&mut self, engine: E) -> Result<()> {
        let fetcher = Fetcher::new(engine)?.with_transport(self.transport.clone());
        self.fetchers.push(fetcher);
        Ok(())
    }

    /// Adds a configured fetcher as is.
    pub fn add_fetcher(&mut self, fetcher: Fetcher) {
        self.fetchers.push(fetcher);
    }

    /// Returns the number of configured engines.
    pub fn engine_count(&self) -> usize {
        self.fetchers.len()
    }

    /// Total counts per engine, in the order engines were added.
    pub async fn count(&self, query: &str) -> Result<Vec<(String, u64)>> {
        self.check(query)?;
        let futures = self.fetchers.iter().map(|fetcher| async move {
            (fetcher.name().to_string(), fetcher.total_count(query).await)
        });
        Ok(join_all(futures).await)
    }

    /// Fetches and normalizes every page of `query` on every engine.
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        self.check(query)?;
        let start = Instant::now();
        debug!("Searching {} engines", self.fetchers.len());

        let futures = self.fetchers.iter().map(|fetcher| async move {
            let identities = fetcher.fetch_all(query).await;
            debug!("Engine {} returned {} hosts", fetcher.name(), identities.len());
            (fetcher.name().to_string(), identities)
        });

        let mut results = SearchResults::new();
        for (name, identities) in join_all(futures).await {
            results.insert(name, identities);
        }
        results.set_duration(start.elapsed().as_millis() as u64);
        Ok(results)
    }

    fn check(&self, query: &str) -> Result<()> {
        if self.fetchers.is_empty() {
            return Err(JixerError::NoEngines);
        }
        if query.trim().is_empty() {
            return Err(JixerError::InvalidQuery("Query cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{Netlas, Shodan};
    use crate::EngineProfile;

    struct Nameless {
        profile: EngineProfile,
    }

    impl Engine for Nameless {
        fn profile(&self) -> &EngineProfile {
            &self.profile
        }

        fn normalize(&self, _items: &[serde_json::Value]) -> crate::IdentitySet {
            crate::IdentitySet::new()
        }
    }

    #[test]
    fn test_search_new() {
        let search = Search::new();
        assert_eq!(search.engine_count(), 0);
    }

    #[test]
    fn test_add_engine() {
        let mut search = Search::new();
        search.add_engine(Shodan::new("k")).unwrap();
        search.add_engine(Netlas::new("k")).unwrap();
        assert_eq!(search.engine_count(), 2);
    }

    #[test]
    fn test_add_engine_rejects_invalid_profile() {
        let mut search = Search::new();
        let result = search.add_engine(Nameless {
            profile: EngineProfile::default(),
        });
        assert!(matches!(result, Err(JixerError::Configuration(_))));
        assert_eq!(search.engine_count(), 0);
    }

    #[tokio::test]
    async fn test_search_no_engines() {
        let search = Search::new();
        let result = search.search("port:22").await;
        assert!(matches!(result, Err(JixerError::NoEngines)));
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let mut search = Search::new();
        search.add_engine(Shodan::new("k")).unwrap();
        let result = search.search("   ").await;
        assert!(matches!(result, Err(JixerError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_count_no_engines() {
        let search = Search::new();
        assert!(matches!(search.count("x").await, Err(JixerError::NoEngines)));
    }
}
