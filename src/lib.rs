//! # jixer
//!
//! A uniform client for internet host search engines (Shodan, Netlas,
//! ZoomEye, FOFA).
//!
//! Each engine answers a count request and serves its results in pages,
//! with its own parameter names, cursor style and response envelope. This
//! crate drives all of them the same way:
//!
//! - Look up the total count for a query
//! - Plan the page cursors, capped at [`DEFAULT_MAX_PAGES`]
//! - Fetch the pages one by one, retrying transient 5xx responses
//! - Normalize every item to an `(ip, domain)` [`IdentityRecord`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use jixer::{Fetcher, engines::Shodan};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = Fetcher::new(Shodan::new("API_KEY"))?;
//!
//!     for host in fetcher.fetch_all("port:22 country:DE").await {
//!         println!("{}", host);
//!     }
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod fetch;
mod result;
mod search;

pub mod engines;
pub mod pagination;
pub mod request;
pub mod transport;

pub use engine::{
    Engine, EngineKind, EngineProfile, PageStyle, QueryEncoding, DEFAULT_MAX_PAGES,
    DEFAULT_RESULTS_PER_PAGE, MAX_RETRY_ATTEMPTS,
};
pub use error::{JixerError, Result};
pub use fetch::{FetchState, Fetcher};
pub use request::PageRequest;
pub use result::{normalize_at, FetchResult, IdentityRecord, IdentitySet, SearchResults};
pub use search::Search;
pub use transport::{RetryPolicy, TransportConfig};
