//! Error types for the host search library.

use thiserror::Error;

/// Result type alias for host search operations.
pub type Result<T> = std::result::Result<T, JixerError>;

/// Errors that can occur while talking to a host search engine.
#[derive(Error, Debug)]
pub enum JixerError {
    /// HTTP request failed (connection, timeout, body read).
    ///
    /// Carries no request URL: API keys travel in its query string.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// Provider answered with a non-success status after transport retries.
    #[error("HTTP status {status} from {url}")]
    Status {
        /// Final status code.
        status: u16,
        /// Request URL with the query string stripped.
        url: String,
    },

    /// Response body is not JSON or lacks the expected envelope field.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Engine profile is unusable as configured.
    #[error("Invalid engine profile: {0}")]
    Configuration(String),

    /// No engines configured.
    #[error("No search engines configured")]
    NoEngines,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl JixerError {
    /// Whether the error came from the network or a non-success status.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }

    /// Whether the error came from reading the response envelope.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<reqwest::Error> for JixerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl From<serde_json::Error> for JixerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_status() {
        let err = JixerError::Status {
            status: 503,
            url: "https://api.shodan.io/shodan/host/search".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP status 503 from https://api.shodan.io/shodan/host/search"
        );
    }

    #[test]
    fn test_error_display_decode() {
        let err = JixerError::Decode("missing field `total`".to_string());
        assert_eq!(err.to_string(), "Failed to decode response: missing field `total`");
    }

    #[test]
    fn test_error_display_configuration() {
        let err = JixerError::Configuration("count field name is empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid engine profile: count field name is empty"
        );
    }

    #[test]
    fn test_error_display_no_engines() {
        assert_eq!(JixerError::NoEngines.to_string(), "No search engines configured");
    }

    #[test]
    fn test_error_display_invalid_query() {
        let err = JixerError::InvalidQuery("empty query".to_string());
        assert_eq!(err.to_string(), "Invalid query: empty query");
    }

    #[test]
    fn test_error_classification() {
        let status = JixerError::Status {
            status: 500,
            url: String::new(),
        };
        assert!(status.is_transport());
        assert!(!status.is_decode());

        let decode = JixerError::Decode("bad".to_string());
        assert!(decode.is_decode());
        assert!(!decode.is_transport());

        assert!(!JixerError::Configuration("x".into()).is_transport());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: JixerError = err.into();
        assert!(err.is_decode());
    }
}
