//! Image reference resolution and fallback ordering.
//!
//! Backend records (blog posts, sponsors) name images inconsistently: some
//! carry absolute URLs baked in at authoring time (occasionally pointing at a
//! developer's machine), some carry server-relative `/uploads` paths, some
//! carry bare relative paths, and some are empty. This module turns such a
//! reference plus an attempt index into one concrete candidate URL, following
//! a deterministic fallback order with a capped retry budget so a broken
//! reference does not retry forever.
//!
//! Resolution is pure string computation: the candidate produced at attempt
//! *n* is a function of `(reference, context, n)` alone, and nothing here
//! performs network I/O. "Trying" a candidate is the caller's job (see
//! `presenter` for the event-driven state machine and `loader` for the
//! fetch-driven walk).

use crate::config::{AssetConfig, DEV_PORT, MAX_RETRIES, PLACEHOLDER_IMAGE, UPLOADS_PREFIX};
use std::collections::HashSet;
use url::{Position, Url};

/// Environment values needed to turn a reference into a candidate URL.
///
/// Carries the current page origin (scheme+host+port) and the configured API
/// base URL pointing at the backend that serves uploaded assets. Threaded
/// explicitly into every operation so resolution stays testable without any
/// ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
  page_origin: String,
  api_base_url: String,
}

/// One step of the fallback sequence: the next URL to try, plus the signal
/// that the retry budget is spent and the caller must stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextCandidate {
  pub url: String,
  pub exhausted: bool,
}

impl ResolutionContext {
  /// Create a context from explicit origin values. Trailing slashes are
  /// trimmed so candidate concatenation stays canonical.
  pub fn new(page_origin: impl Into<String>, api_base_url: impl Into<String>) -> Self {
    Self {
      page_origin: page_origin.into().trim_end_matches('/').to_string(),
      api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
    }
  }

  /// Create a context from `GTC_*` environment variables.
  pub fn from_env() -> Self {
    Self::from_config(&AssetConfig::from_env())
  }

  /// Create a context from an [`AssetConfig`].
  pub fn from_config(config: &AssetConfig) -> Self {
    Self::new(config.page_origin.clone(), config.api_base_url.clone())
  }

  /// Origin the pages are served from.
  pub fn page_origin(&self) -> &str {
    &self.page_origin
  }

  /// Base URL of the backend serving uploaded assets.
  pub fn api_base_url(&self) -> &str {
    &self.api_base_url
  }

  /// Produce the first candidate URL for a reference.
  ///
  /// - Empty references resolve straight to the placeholder.
  /// - Absolute URLs pass through unchanged, unless they name a development
  ///   authority (loopback host or the backend dev port) while the page is
  ///   served from a different origin; those are re-hosted onto the page
  ///   origin, keeping path and query.
  /// - `/uploads` paths are prefixed with the API base URL when the page
  ///   itself runs on a loopback host (production serves uploads from the
  ///   page origin, so they pass through there).
  /// - Any other relative form passes through unchanged.
  pub fn initial_candidate(&self, reference: &str) -> String {
    let reference = reference.trim();
    if reference.is_empty() {
      return PLACEHOLDER_IMAGE.to_string();
    }

    if is_http_url(reference) {
      return self.rehost_stale_authority(reference);
    }

    if starts_with_uploads(reference) && self.is_dev_page() {
      return format!("{}{}", self.api_base_url, reference);
    }

    reference.to_string()
  }

  /// Produce the candidate after `previous` failed to load.
  ///
  /// The schedule is independent of whichever heuristic produced the failed
  /// candidate:
  ///
  /// - attempt 0: toggle representation. An absolute candidate is reduced to
  ///   a server-relative form (from the `/uploads` segment when present), a
  ///   relative candidate is made absolute against the API base URL;
  /// - attempt 1: the page origin joined with the relative path portion of
  ///   the *original* reference;
  /// - attempt 2 and beyond: the placeholder, with `exhausted` set. Callers
  ///   must not invoke this again for the same reference once exhausted.
  pub fn next_candidate(&self, reference: &str, previous: &str, attempt: u8) -> NextCandidate {
    // Inline data URLs have no alternate representation to fall back to.
    if attempt >= MAX_RETRIES || reference.trim_start().starts_with("data:") {
      return NextCandidate {
        url: PLACEHOLDER_IMAGE.to_string(),
        exhausted: true,
      };
    }

    let url = match attempt {
      0 => self.toggled_representation(previous),
      _ => self.page_relative(reference),
    };

    NextCandidate {
      url,
      exhausted: false,
    }
  }

  /// Ordered, deduplicated list of every candidate a presenter would try for
  /// `reference`, ending with the placeholder. First occurrence wins; the
  /// list never exceeds four entries.
  pub fn candidate_chain(&self, reference: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut current = self.initial_candidate(reference);
    if current == PLACEHOLDER_IMAGE {
      return vec![current];
    }

    for attempt in 0..=MAX_RETRIES {
      if seen.insert(current.clone()) {
        chain.push(current.clone());
      }
      let next = self.next_candidate(reference, &current, attempt);
      if next.exhausted {
        break;
      }
      current = next.url;
    }

    chain.push(PLACEHOLDER_IMAGE.to_string());
    chain
  }

  /// True when the page itself is being served from a loopback host.
  pub fn is_dev_page(&self) -> bool {
    Url::parse(&self.page_origin)
      .ok()
      .as_ref()
      .and_then(Url::host_str)
      .map(is_loopback_host)
      .unwrap_or(false)
  }

  /// Rewrite the authority of a stale development URL onto the page origin,
  /// preserving path and query. Anything that is not a stale development
  /// authority passes through unchanged.
  fn rehost_stale_authority(&self, reference: &str) -> String {
    let Ok(parsed) = Url::parse(reference) else {
      return reference.to_string();
    };
    if !is_dev_authority(&parsed) {
      return reference.to_string();
    }
    let Ok(page) = Url::parse(&self.page_origin) else {
      return reference.to_string();
    };
    if same_authority(&parsed, &page) {
      return reference.to_string();
    }

    let suffix = &parsed[Position::BeforePath..Position::AfterQuery];
    format!("{}{}", page.origin().ascii_serialization(), suffix)
  }

  fn toggled_representation(&self, previous: &str) -> String {
    if is_http_url(previous) {
      server_relative_form(previous)
    } else {
      format!("{}{}", self.api_base_url, rooted(previous))
    }
  }

  fn page_relative(&self, reference: &str) -> String {
    let origin = Url::parse(&self.page_origin)
      .map(|u| u.origin().ascii_serialization())
      .unwrap_or_else(|_| self.page_origin.clone());
    format!("{}{}", origin, relative_path_of(reference))
  }
}

/// True for `http://` / `https://` references (the only schemes the backend
/// emits for absolute image URLs).
fn is_http_url(reference: &str) -> bool {
  reference.starts_with("http://") || reference.starts_with("https://")
}

fn starts_with_uploads(reference: &str) -> bool {
  match reference.strip_prefix(UPLOADS_PREFIX) {
    Some(rest) => matches!(rest.chars().next(), None | Some('/') | Some('?')),
    None => false,
  }
}

fn is_loopback_host(host: &str) -> bool {
  matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

/// A URL matches the development-host pattern when it points at a loopback
/// host or at the backend's development port on any host. The latter catches
/// absolute URLs authored against a developer's machine that leaked into
/// backend data with a non-loopback hostname.
fn is_dev_authority(url: &Url) -> bool {
  if url.host_str().map(is_loopback_host).unwrap_or(false) {
    return true;
  }
  url.port() == Some(DEV_PORT)
}

fn same_authority(a: &Url, b: &Url) -> bool {
  a.scheme() == b.scheme()
    && a.host_str() == b.host_str()
    && a.port_or_known_default() == b.port_or_known_default()
}

/// Reduce an absolute candidate to a server-relative form: the path from the
/// `/uploads` segment when one is present, the full path (plus query)
/// otherwise.
fn server_relative_form(candidate: &str) -> String {
  if let Ok(parsed) = Url::parse(candidate) {
    let path = &parsed[Position::BeforePath..Position::AfterQuery];
    return uploads_suffix(path).unwrap_or(path).to_string();
  }
  strip_authority(candidate)
}

/// The relative path portion of a reference: the path (plus query) of an
/// absolute URL, or the reference itself rooted with a leading slash.
fn relative_path_of(reference: &str) -> String {
  if is_http_url(reference) {
    if let Ok(parsed) = Url::parse(reference) {
      return parsed[Position::BeforePath..Position::AfterQuery].to_string();
    }
    return strip_authority(reference);
  }
  rooted(reference).to_string()
}

/// Locate a `/uploads` path segment and return the path from there on.
/// Requires a segment boundary so `/my-uploads/x.png` is not rewritten.
fn uploads_suffix(path: &str) -> Option<&str> {
  for (idx, _) in path.match_indices(UPLOADS_PREFIX) {
    let after = path[idx + UPLOADS_PREFIX.len()..].chars().next();
    if matches!(after, None | Some('/') | Some('?')) {
      return Some(&path[idx..]);
    }
  }
  None
}

/// Best-effort path extraction for absolute references the `url` crate
/// rejects: cut everything up to the first slash after the authority.
fn strip_authority(reference: &str) -> String {
  let after_scheme = match reference.find("://") {
    Some(idx) => &reference[idx + 3..],
    None => reference,
  };
  match after_scheme.find('/') {
    Some(idx) => after_scheme[idx..].to_string(),
    None => "/".to_string(),
  }
}

fn rooted(reference: &str) -> std::borrow::Cow<'_, str> {
  if reference.starts_with('/') {
    std::borrow::Cow::Borrowed(reference)
  } else {
    std::borrow::Cow::Owned(format!("/{}", reference))
  }
}
