//! Error types for gtceuta-assets
//!
//! Resolution itself never fails: malformed references degrade to the
//! placeholder (see `resolver`). Errors only arise at the fetch layer when a
//! candidate URL is actually probed. All errors use the `thiserror` crate for
//! minimal boilerplate and proper error trait implementations.

use thiserror::Error;

/// Result type alias for gtceuta-assets operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for gtceuta-assets
///
/// # Examples
///
/// ```
/// use gtceuta_assets::error::{Error, FetchError};
///
/// fn probe() -> Result<(), Error> {
///     Err(Error::Fetch(FetchError::LoadFailed {
///         url: "https://gtceuta.com/uploads/logo.png".to_string(),
///         reason: "connection refused".to_string(),
///     }))
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
  /// A candidate URL could not be fetched
  #[error("Fetch error: {0}")]
  Fetch(#[from] FetchError),

  /// I/O error (file reading, network, etc.)
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

/// Errors that occur while fetching a candidate URL
///
/// The fallback policy treats every variant identically (the attempt counter
/// advances); the distinction exists only so diagnostics can say what
/// actually went wrong.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
  /// The candidate could not be loaded (HTTP failure, unreachable host,
  /// unreadable file)
  #[error("Failed to load {url}: {reason}")]
  LoadFailed { url: String, reason: String },

  /// A `data:` URL could not be decoded
  #[error("Invalid data URL: {reason}")]
  InvalidDataUrl { reason: String },

  /// Redirect chain exceeded the hop limit
  #[error("Too many redirects fetching {url}")]
  TooManyRedirects { url: String },

  /// Response body exceeded the configured size cap
  #[error("Response for {url} exceeded {limit} bytes")]
  ResponseTooLarge { url: String, limit: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fetch_error_display_includes_url_and_reason() {
    let err = FetchError::LoadFailed {
      url: "https://gtceuta.com/uploads/x.png".to_string(),
      reason: "404".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("https://gtceuta.com/uploads/x.png"));
    assert!(msg.contains("404"));
  }

  #[test]
  fn fetch_error_converts_into_top_level_error() {
    let err: Error = FetchError::TooManyRedirects {
      url: "http://localhost:4000/uploads/a.png".to_string(),
    }
    .into();
    assert!(matches!(err, Error::Fetch(_)));
  }
}
