//! Resolution constants and environment-derived configuration.
//!
//! Deployment-dependent values (page origin, API base URL, fetch timeout)
//! are captured once from `GTC_*` environment variables via
//! [`AssetConfig::from_env`] and then threaded explicitly through the
//! resolver, so no resolution path reads ambient global state. Callers can
//! also construct instances manually (or via [`AssetConfig::from_map`]) to
//! override environment-derived behavior when embedding the library.

use std::collections::HashMap;
use std::time::Duration;

/// Path prefix under which the backend serves uploaded assets.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Terminal fallback shown when every candidate for a reference has failed.
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

/// Port the backend listens on during development. Absolute references
/// naming this port were baked in at data-authoring time on a developer's
/// machine and must not be followed from any other origin.
pub const DEV_PORT: u16 = 4000;

/// Default base URL of the backend serving `/uploads` assets.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:4000";

/// Default page origin assumed when none is configured.
pub const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:3000";

/// Retries beyond the initial candidate before a reference is exhausted.
pub const MAX_RETRIES: u8 = 2;

/// Prefix filtering which environment variables [`AssetConfig::from_env`]
/// captures.
pub const ENV_PREFIX: &str = "GTC_";

const KEY_PAGE_ORIGIN: &str = "GTC_PAGE_ORIGIN";
const KEY_API_BASE_URL: &str = "GTC_API_BASE_URL";
const KEY_FETCH_TIMEOUT_SECS: &str = "GTC_FETCH_TIMEOUT_SECS";

/// Deployment configuration for asset resolution and probing.
#[derive(Debug, Clone)]
pub struct AssetConfig {
  /// Origin (scheme+host+port) the pages are served from.
  pub page_origin: String,
  /// Base URL of the backend serving uploaded assets.
  pub api_base_url: String,
  /// Transport-level timeout applied by the HTTP fetcher. The fallback
  /// policy itself imposes no timeout.
  pub fetch_timeout: Duration,
}

impl AssetConfig {
  /// Capture all `GTC_*` environment variables into a config.
  pub fn from_env() -> Self {
    let vars = std::env::vars()
      .filter(|(k, _)| k.starts_with(ENV_PREFIX))
      .collect::<HashMap<_, _>>();
    Self::from_map(&vars)
  }

  /// Build a config from a provided map of key/value pairs. Unknown keys are
  /// ignored; missing keys fall back to defaults.
  pub fn from_map(vars: &HashMap<String, String>) -> Self {
    let mut config = Self::default();
    if let Some(origin) = non_empty(vars.get(KEY_PAGE_ORIGIN)) {
      config.page_origin = origin.to_string();
    }
    if let Some(base) = non_empty(vars.get(KEY_API_BASE_URL)) {
      config.api_base_url = base.to_string();
    }
    if let Some(secs) = vars.get(KEY_FETCH_TIMEOUT_SECS).and_then(|v| v.trim().parse::<u64>().ok())
    {
      config.fetch_timeout = Duration::from_secs(secs);
    }
    config
  }

  /// Override the page origin.
  pub fn with_page_origin(mut self, origin: impl Into<String>) -> Self {
    self.page_origin = origin.into();
    self
  }

  /// Override the API base URL.
  pub fn with_api_base_url(mut self, base: impl Into<String>) -> Self {
    self.api_base_url = base.into();
    self
  }

  /// Override the fetch timeout.
  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }
}

impl Default for AssetConfig {
  fn default() -> Self {
    Self {
      page_origin: DEFAULT_PAGE_ORIGIN.to_string(),
      api_base_url: DEFAULT_API_BASE_URL.to_string(),
      fetch_timeout: Duration::from_secs(30),
    }
  }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
  value.map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}
