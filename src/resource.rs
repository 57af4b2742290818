//! Candidate fetching abstraction
//!
//! The resolver only computes strings; "trying" a candidate means handing it
//! to something that can load it. This module provides that something as a
//! trait so the loader stays agnostic about transport, enabling:
//!
//! - Mocking for tests (the integration tests use a HashMap-backed fetcher)
//! - Offline probing against a local uploads directory via `file://`
//! - Custom transports in embedding applications
//!
//! # Example
//!
//! ```rust,ignore
//! use gtceuta_assets::resource::{HttpFetcher, ResourceFetcher};
//!
//! let fetcher = HttpFetcher::new();
//! let resource = fetcher.fetch("https://gtceuta.com/uploads/logo.png")?;
//! println!("Got {} bytes", resource.bytes.len());
//! ```

use crate::error::{FetchError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// User-Agent sent by the default HTTP fetcher.
pub const DEFAULT_USER_AGENT: &str = "gtceuta-assets/0.1 (+https://gtceuta.com)";

/// Hop limit for redirect chains.
const MAX_REDIRECTS: usize = 10;

/// Result of fetching one candidate URL
#[derive(Debug, Clone)]
pub struct FetchedResource {
  /// Raw bytes of the resource
  pub bytes: Vec<u8>,
  /// Content-Type header value, if available (e.g., "image/png")
  pub content_type: Option<String>,
  /// URL the bytes were ultimately served from, after redirects
  pub final_url: Option<String>,
}

impl FetchedResource {
  /// Create a new FetchedResource without redirect tracking
  pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
    Self {
      bytes,
      content_type,
      final_url: None,
    }
  }

  /// Create a new FetchedResource recording the post-redirect URL
  pub fn with_final_url(bytes: Vec<u8>, content_type: Option<String>, final_url: Option<String>) -> Self {
    Self {
      bytes,
      content_type,
      final_url,
    }
  }

  /// Check if this resource appears to be an image based on content-type
  pub fn is_image(&self) -> bool {
    self
      .content_type
      .as_ref()
      .map(|ct| ct.trim_start().starts_with("image/"))
      .unwrap_or(false)
  }

  /// True when the resource can stand in for an image: a declared image
  /// content type, or no declared type at all (plain file reads and terse
  /// servers omit it). A declared non-image type, such as an HTML error page
  /// served with 200, does not satisfy a candidate.
  pub fn is_acceptable_image(&self) -> bool {
    match &self.content_type {
      Some(ct) => ct.trim_start().starts_with("image/"),
      None => !self.bytes.is_empty(),
    }
  }
}

/// Trait for fetching candidate URLs
///
/// URLs can be:
/// - `http://` or `https://` - fetch over network
/// - `file://` - read from filesystem
/// - `data:` - decode inline
///
/// Implementations must be `Send + Sync` so a loader can be shared across
/// threads.
pub trait ResourceFetcher: Send + Sync {
  /// Fetch a candidate, returning its bytes and optional content type, or an
  /// error when it cannot be loaded. The fallback policy does not care which
  /// error; every failure advances the attempt counter identically.
  fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

// Allow Arc<dyn ResourceFetcher> to be used as ResourceFetcher
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
  fn fetch(&self, url: &str) -> Result<FetchedResource> {
    (**self).fetch(url)
  }
}

/// Default HTTP candidate fetcher
///
/// Fetches over HTTP/HTTPS with a configurable timeout, size cap, and
/// User-Agent. Also handles `file://` paths and `data:` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  timeout: Duration,
  user_agent: String,
  max_size: usize,
}

impl HttpFetcher {
  /// Create a new HttpFetcher with default settings
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the request timeout
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Set the User-Agent header
  pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
    self.user_agent = user_agent.into();
    self
  }

  /// Set the maximum response size in bytes
  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size;
    self
  }

  fn fetch_http(&self, url: &str) -> Result<FetchedResource> {
    let config = ureq::Agent::config_builder()
      .timeout_global(Some(self.timeout))
      .build();
    let agent: ureq::Agent = config.into();

    let mut current = url.to_string();
    for _ in 0..MAX_REDIRECTS {
      let mut response = agent
        .get(&current)
        .header("User-Agent", &self.user_agent)
        .call()
        .map_err(|e| FetchError::LoadFailed {
          url: current.clone(),
          reason: e.to_string(),
        })?;

      let status = response.status();
      if (300..400).contains(&status.as_u16()) {
        if let Some(loc) = response.headers().get("location").and_then(|h| h.to_str().ok()) {
          current = Url::parse(&current)
            .ok()
            .and_then(|base| base.join(loc).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| loc.to_string());
          continue;
        }
      }
      if !status.is_success() {
        return Err(
          FetchError::LoadFailed {
            url: current,
            reason: format!("HTTP status {}", status.as_u16()),
          }
          .into(),
        );
      }

      if let Some(len) = response
        .headers()
        .get("content-length")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
      {
        if len > self.max_size {
          return Err(
            FetchError::ResponseTooLarge {
              url: current,
              limit: self.max_size,
            }
            .into(),
          );
        }
      }

      let content_type = response
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

      let bytes = response
        .body_mut()
        .with_config()
        .limit(self.max_size as u64)
        .read_to_vec()
        .map_err(|e| FetchError::LoadFailed {
          url: current.clone(),
          reason: e.to_string(),
        })?;

      if bytes.is_empty() {
        return Err(
          FetchError::LoadFailed {
            url: current,
            reason: "empty response body".to_string(),
          }
          .into(),
        );
      }

      return Ok(FetchedResource::with_final_url(bytes, content_type, Some(current)));
    }

    Err(FetchError::TooManyRedirects { url: url.to_string() }.into())
  }

  fn fetch_file(&self, url: &str) -> Result<FetchedResource> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let bytes = std::fs::read(path).map_err(|e| FetchError::LoadFailed {
      url: url.to_string(),
      reason: e.to_string(),
    })?;

    let content_type = guess_content_type_from_path(path);
    Ok(FetchedResource::new(bytes, content_type))
  }
}

impl Default for HttpFetcher {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      max_size: 10 * 1024 * 1024,
    }
  }
}

impl ResourceFetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<FetchedResource> {
    if url.starts_with("data:") {
      decode_data_url(url)
    } else if url.starts_with("file://") {
      self.fetch_file(url)
    } else if url.starts_with("http://") || url.starts_with("https://") {
      self.fetch_http(url)
    } else {
      // Server-relative candidates reach a fetcher only when no origin is
      // known to absolutize them; treat as a local file path.
      self.fetch_file(&format!("file://{}", url))
    }
  }
}

/// Guess content-type from file path extension
fn guess_content_type_from_path(path: &str) -> Option<String> {
  let ext = Path::new(path)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_lowercase())?;

  let mime = match ext.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "avif" => "image/avif",
    "svg" => "image/svg+xml",
    "ico" => "image/x-icon",
    "bmp" => "image/bmp",
    _ => return None,
  };

  Some(mime.to_string())
}

/// Decode a data: URL into bytes
fn decode_data_url(url: &str) -> Result<FetchedResource> {
  let rest = url.strip_prefix("data:").ok_or_else(|| FetchError::InvalidDataUrl {
    reason: "URL does not start with 'data:'".to_string(),
  })?;

  let comma_pos = rest.find(',').ok_or_else(|| FetchError::InvalidDataUrl {
    reason: "Missing comma in data URL".to_string(),
  })?;

  let header = &rest[..comma_pos];
  let data = &rest[comma_pos + 1..];

  // Header shape: [mediatype][;base64]
  let is_base64 = header.ends_with(";base64");
  let media_type = header
    .split(';')
    .next()
    .filter(|s| !s.is_empty() && s.contains('/'))
    .map(|s| s.to_string());

  let bytes = if is_base64 {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
      .decode(data)
      .map_err(|e| FetchError::InvalidDataUrl {
        reason: format!("Invalid base64: {}", e),
      })?
  } else {
    percent_decode(data)?
  };

  Ok(FetchedResource::new(bytes, media_type))
}

/// Percent-decode a string to bytes
fn percent_decode(input: &str) -> Result<Vec<u8>> {
  let mut out = Vec::with_capacity(input.len());
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    if bytes[i] == b'%' {
      if i + 2 >= bytes.len() {
        return Err(
          FetchError::InvalidDataUrl {
            reason: "Incomplete percent-escape".to_string(),
          }
          .into(),
        );
      }
      let hi = (bytes[i + 1] as char).to_digit(16);
      let lo = (bytes[i + 2] as char).to_digit(16);
      match (hi, lo) {
        (Some(hi), Some(lo)) => {
          out.push(((hi << 4) | lo) as u8);
          i += 3;
        }
        _ => {
          return Err(
            FetchError::InvalidDataUrl {
              reason: "Invalid percent-escape".to_string(),
            }
            .into(),
          )
        }
      }
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }

  Ok(out)
}
