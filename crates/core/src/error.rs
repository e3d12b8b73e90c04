//! Error types for Gleaner operations.
//!
//! This module defines the main error type [`GleanerError`]. The variants
//! that reach a reader (missing selector rules, extraction failures, fetch
//! failures, credential prompts) carry a message suitable for display.
//! Internal heuristic skips are logged instead of being returned.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::{GleanerError, Result};
//!
//! fn require_content(html: &str) -> Result<&str> {
//!     if html.trim().is_empty() {
//!         return Err(GleanerError::ReadabilityFailed);
//!     }
//!     Ok(html)
//! }
//! ```

use thiserror::Error;

/// Main error type for extraction, configuration and fetch operations.
///
/// # Example
///
/// ```rust
/// use gleaner_core::GleanerError;
///
/// let err = GleanerError::AuthRequired { domain: "https://example.com".into() };
/// assert!(err.is_auth_required());
/// ```
#[derive(Error, Debug)]
pub enum GleanerError {
    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A CSS selector could not be parsed.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Selector mode was requested but the feed has neither rules nor custom CSS.
    #[error("No selector rules are configured for this feed. Add at least one rule or switch to reader mode.")]
    NoSelectorConfig,

    /// The Readability engine returned nothing usable.
    #[error("Could not extract a readable article from this page. Try selector mode or configure selectors.")]
    ReadabilityFailed,

    /// The configured selectors matched nothing usable.
    #[error("The configured selectors did not match any content on this page.")]
    SelectorsNoContent,

    /// Network or transport failure while fetching the page.
    #[error("Failed to fetch the page: {0}")]
    FetchFailed(String),

    /// The remote site asked for interactive credentials.
    #[error("Credentials are required for {domain}")]
    AuthRequired { domain: String },

    /// Encrypting a stored credential failed.
    #[error("Failed to encrypt credential")]
    EncryptionFailed,

    /// Decrypting a stored credential failed (wrong master secret, salt or IV).
    #[error("Failed to decrypt credential")]
    DecryptionFailed,

    /// Stored binary value was not valid base64.
    #[error("Invalid base64 value: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// Configuration store errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors for the persisted configuration blob.
    #[error("Failed to (de)serialize configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GleanerError {
    /// Returns true for errors that should surface a credential prompt
    /// instead of an error banner.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, GleanerError::AuthRequired { .. })
    }
}

/// Result type alias for GleanerError.
pub type Result<T> = std::result::Result<T, GleanerError>;
