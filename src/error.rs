//! Unified error type for the bridge.

use thiserror::Error;

/// All errors that can occur while searching, caching, locating or fetching.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// I/O error (cache file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache record (de)serialization error (bincode)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Response body that is not the JSON we expect
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The search provider call failed (transport error or non-2xx status)
    #[error("Search provider error{}: {message}", status_suffix(.status))]
    SearchProvider {
        status: Option<u16>,
        message: String,
    },

    /// No live cache entry exists for this query
    #[error("No cached results for query '{query}'. Run grep_query with this exact query first.")]
    NoCachedResults { query: String },

    /// None of the requested result numbers exist in the cached result set
    #[error("None of the requested result numbers {requested:?} exist (valid range: 1..={available})")]
    InvalidResultNumbers {
        requested: Vec<usize>,
        available: usize,
    },

    /// One file could not be fetched from the hosting API
    #[error("Failed to fetch {repository}/{path}: {message}")]
    FileFetch {
        repository: String,
        path: String,
        message: String,
    },

    /// Invalid regex filter pattern
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Mutually exclusive flags or other argument validation error
    #[error("{0}")]
    InvalidArgs(String),

    /// Failed to load a cache record from disk
    #[error("Failed to load cache entry from {path}: {message}")]
    CacheLoad { path: String, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_search_provider_display_with_status() {
        let err = BridgeError::SearchProvider {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 429"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn test_search_provider_display_without_status() {
        let err = BridgeError::SearchProvider {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Search provider error: connection refused");
    }

    #[test]
    fn test_no_cached_results_display() {
        let err = BridgeError::NoCachedResults {
            query: "nonexistent query".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nonexistent query"));
        assert!(msg.contains("grep_query"));
    }

    #[test]
    fn test_invalid_result_numbers_display() {
        let err = BridgeError::InvalidResultNumbers {
            requested: vec![7, 9],
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("[7, 9]"));
        assert!(msg.contains("1..=3"));
    }

    #[test]
    fn test_invalid_regex_display() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err = BridgeError::InvalidRegex {
            pattern: "[invalid".to_string(),
            source: regex_err,
        };
        assert!(err.to_string().contains("[invalid"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
