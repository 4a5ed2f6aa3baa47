//! Error types and handling for citemend-core operations.
//!
//! Most failures in this crate are deliberately *not* errors: an unreachable
//! URL, a rejected domain, or an exhausted search budget all convert into a
//! repaired or fallback citation and never surface to the caller. The `Error`
//! type below covers the remaining failure modes: constructing the HTTP
//! client, talking to the search backend, and loading configuration.
//!
//! Errors carry a coarse category for logging and a recoverability hint for
//! retry logic:
//!
//! ```rust
//! use citemend_core::{Error, Result};
//!
//! fn handle(result: Result<()>) {
//!     match result {
//!         Err(e) if e.is_recoverable() => eprintln!("transient, retry: {e}"),
//!         Err(e) => eprintln!("permanent ({}): {e}", e.category()),
//!         Ok(()) => {},
//!     }
//! }
//! ```

use thiserror::Error;

/// The main error type for citemend-core operations.
///
/// All public fallible functions in this crate return `Result<T, Error>`.
/// The error chain is preserved through `source()` for variants wrapping
/// third-party errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Network operation failed.
    ///
    /// Covers HTTP requests made while validating URLs or calling the search
    /// backend. The underlying `reqwest::Error` is preserved for connection
    /// detail. Inside the validation pipeline this is absorbed and converted
    /// into an "unreachable" classification; it only propagates from client
    /// construction and direct provider calls.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Source text could not be parsed.
    ///
    /// Extraction is lenient (malformed lines are skipped), so this is
    /// reserved for inputs that defeat parsing entirely.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The alternative-URL search backend failed.
    ///
    /// Covers non-2xx API responses and malformed search payloads. Callers
    /// inside the pipeline treat this as "no candidate found".
    #[error("Search error: {0}")]
    Search(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL is malformed or invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation timed out.
    ///
    /// Typically recoverable with retry logic.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for errors that are typically temporary: network
    /// timeouts and connection failures, explicit timeouts, and search
    /// backend hiccups. Parse and configuration failures are permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) | Self::Search(_) => true,
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Used to group errors in logs without matching on the full variant.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Search(_) => "search",
            Self::Config(_) => "config",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_error_display_formatting() {
        let errors = vec![
            Error::Parse("invalid syntax".to_string()),
            Error::Search("backend down".to_string()),
            Error::Config("missing field".to_string()),
            Error::InvalidUrl("not a url".to_string()),
            Error::Timeout("operation timed out".to_string()),
            Error::Serialization("bad json".to_string()),
            Error::Other("unknown error".to_string()),
        ];

        for error in errors {
            let error_string = error.to_string();
            assert!(!error_string.is_empty());
            match error {
                Error::Parse(msg) => {
                    assert!(error_string.contains("Parse error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Search(msg) => {
                    assert!(error_string.contains("Search error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Config(msg) => {
                    assert!(error_string.contains("Configuration error"));
                    assert!(error_string.contains(&msg));
                },
                Error::InvalidUrl(msg) => {
                    assert!(error_string.contains("Invalid URL"));
                    assert!(error_string.contains(&msg));
                },
                Error::Timeout(msg) => {
                    assert!(error_string.contains("Timeout"));
                    assert!(error_string.contains(&msg));
                },
                Error::Serialization(msg) => {
                    assert!(error_string.contains("Serialization error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Other(msg) => {
                    assert_eq!(error_string, msg);
                },
                Error::Network(_) => {},
            }
        }
    }

    #[test]
    fn test_error_categories() {
        let cases = vec![
            (Error::Parse("x".to_string()), "parse"),
            (Error::Search("x".to_string()), "search"),
            (Error::Config("x".to_string()), "config"),
            (Error::InvalidUrl("x".to_string()), "invalid_url"),
            (Error::Timeout("x".to_string()), "timeout"),
            (Error::Serialization("x".to_string()), "serialization"),
            (Error::Other("x".to_string()), "other"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.category(), expected);
        }
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = vec![
            Error::Timeout("request timeout".to_string()),
            Error::Search("rate limited".to_string()),
        ];
        let permanent = vec![
            Error::Parse("bad syntax".to_string()),
            Error::Config("invalid config".to_string()),
            Error::InvalidUrl("bad url".to_string()),
            Error::Serialization("bad json".to_string()),
            Error::Other("generic".to_string()),
        ];

        for error in recoverable {
            assert!(error.is_recoverable(), "expected {error:?} recoverable");
        }
        for error in permanent {
            assert!(!error.is_recoverable(), "expected {error:?} permanent");
        }
    }

    #[test]
    fn test_serde_json_error_converts_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: Error = json_err.into();
        assert_eq!(error.category(), "serialization");
    }

    #[test]
    fn test_toml_error_converts_to_serialization() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let error: Error = toml_err.into();
        assert_eq!(error.category(), "serialization");
    }

    proptest! {
        #[test]
        fn test_parse_error_with_arbitrary_messages(msg in r".{0,200}") {
            let error = Error::Parse(msg.clone());
            let error_string = error.to_string();

            prop_assert!(error_string.contains("Parse error"));
            prop_assert!(error_string.contains(&msg));
            prop_assert_eq!(error.category(), "parse");
            prop_assert!(!error.is_recoverable());
        }

        #[test]
        fn test_search_error_with_arbitrary_messages(msg in r".{0,200}") {
            let error = Error::Search(msg.clone());
            let error_string = error.to_string();

            prop_assert!(error_string.contains("Search error"));
            prop_assert!(error_string.contains(&msg));
            prop_assert_eq!(error.category(), "search");
            prop_assert!(error.is_recoverable());
        }
    }
}
