//! Custom error types for bibgrab.
//!
//! Only transport and I/O problems are modeled as errors. Empty, ambiguous
//! or malformed resolutions are statuses reported per input item, not
//! errors, so that one bad input never aborts the run.

use thiserror::Error;

/// Main error type for bibgrab operations.
#[derive(Debug, Error)]
pub enum BibgrabError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote endpoint answered with a non-success status
    #[error("Remote error: HTTP {code} for {url}")]
    Remote {
        /// HTTP status code
        code: u16,
        /// Requested URL
        url: String,
    },

    /// Remote page parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `BibgrabError`
pub type Result<T> = std::result::Result<T, BibgrabError>;
