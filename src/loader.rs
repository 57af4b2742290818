//! Fetch-driven resolution.
//!
//! `AssetLoader` walks the resolver's candidate chain against a
//! [`ResourceFetcher`], caching the outcome per reference so repeated
//! renders of the same blog post or sponsor strip do not re-probe dead
//! URLs. This is the headless counterpart of a browser's image element:
//! each fetch stands in for one load/error event.

use crate::config::PLACEHOLDER_IMAGE;
use crate::diagnostics::ResolutionDiagnostics;
use crate::resolver::ResolutionContext;
use crate::resource::{HttpFetcher, ResourceFetcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Final outcome of resolving one reference.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
  /// The raw reference as stored in backend data.
  pub reference: String,
  /// The candidate that loaded, or the placeholder path on exhaustion.
  pub url: String,
  /// Bytes of the winning candidate. Empty for placeholder outcomes: the
  /// placeholder ships with the site bundle and needs no fetch.
  pub bytes: Vec<u8>,
  /// Content type of the winning candidate, when declared.
  pub content_type: Option<String>,
  /// Candidates actually tried (0 for empty references).
  pub attempts: u8,
  /// True when the retry budget was spent and the placeholder is pinned.
  pub placeholder: bool,
}

impl ResolvedAsset {
  fn exhausted(reference: &str, attempts: u8) -> Self {
    Self {
      reference: reference.to_string(),
      url: PLACEHOLDER_IMAGE.to_string(),
      bytes: Vec::new(),
      content_type: None,
      attempts,
      placeholder: true,
    }
  }
}

/// Walks candidate chains against a fetcher, with a shared outcome cache.
pub struct AssetLoader {
  context: ResolutionContext,
  fetcher: Arc<dyn ResourceFetcher>,
  cache: Arc<Mutex<HashMap<String, Arc<ResolvedAsset>>>>,
  diagnostics: Option<Arc<Mutex<ResolutionDiagnostics>>>,
}

impl AssetLoader {
  /// Create a loader with the default HTTP fetcher.
  pub fn new(context: ResolutionContext) -> Self {
    Self::with_fetcher(context, Arc::new(HttpFetcher::new()))
  }

  /// Create a loader with a custom fetcher.
  pub fn with_fetcher(context: ResolutionContext, fetcher: Arc<dyn ResourceFetcher>) -> Self {
    Self {
      context,
      fetcher,
      cache: Arc::new(Mutex::new(HashMap::new())),
      diagnostics: None,
    }
  }

  /// Attach a diagnostics sink for recording candidate failures.
  pub fn set_diagnostics_sink(&mut self, sink: Option<Arc<Mutex<ResolutionDiagnostics>>>) {
    self.diagnostics = sink;
  }

  /// The resolution context this loader resolves against.
  pub fn context(&self) -> &ResolutionContext {
    &self.context
  }

  /// Resolve a reference to its final asset, walking the fallback chain.
  ///
  /// Never fails: exhaustion degrades to a placeholder outcome. Outcomes
  /// (successes and placeholders alike) are cached by raw reference and
  /// shared across clones of this loader.
  pub fn load(&self, reference: &str) -> Arc<ResolvedAsset> {
    self.record(|d| d.requests += 1);

    if let Some(hit) = self
      .cache
      .lock()
      .ok()
      .and_then(|cache| cache.get(reference).cloned())
    {
      self.record(|d| d.cache_hits += 1);
      return hit;
    }
    self.record(|d| d.cache_misses += 1);

    let outcome = Arc::new(self.walk_chain(reference));
    if let Ok(mut cache) = self.cache.lock() {
      cache.insert(reference.to_string(), Arc::clone(&outcome));
    }
    outcome
  }

  /// Drop all cached outcomes, forcing the next `load` of each reference to
  /// re-probe. Intended for admin flows right after an upload replaces an
  /// asset in place.
  pub fn invalidate(&self) {
    if let Ok(mut cache) = self.cache.lock() {
      cache.clear();
    }
  }

  fn walk_chain(&self, reference: &str) -> ResolvedAsset {
    let chain = self.context.candidate_chain(reference);
    // The chain always ends with the placeholder, which is never fetched.
    let candidates = &chain[..chain.len() - 1];

    for (attempt, candidate) in candidates.iter().enumerate() {
      let attempt = attempt as u8;
      if attempt > 0 {
        self.record(|d| d.fallbacks += 1);
      }

      match self.fetcher.fetch(candidate) {
        Ok(resource) if resource.is_acceptable_image() => {
          return ResolvedAsset {
            reference: reference.to_string(),
            url: resource.final_url.clone().unwrap_or_else(|| candidate.clone()),
            bytes: resource.bytes,
            content_type: resource.content_type,
            attempts: attempt + 1,
            placeholder: false,
          };
        }
        Ok(resource) => {
          let declared = resource.content_type.as_deref().unwrap_or("unknown");
          self.record(|d| {
            d.record_failure(
              reference,
              candidate,
              attempt,
              format!("unexpected content type {}", declared),
            )
          });
        }
        Err(err) => {
          self.record(|d| d.record_failure(reference, candidate, attempt, err.to_string()));
        }
      }
    }

    self.record(|d| d.exhausted += 1);
    ResolvedAsset::exhausted(reference, candidates.len() as u8)
  }

  fn record(&self, update: impl FnOnce(&mut ResolutionDiagnostics)) {
    if let Some(sink) = &self.diagnostics {
      if let Ok(mut guard) = sink.lock() {
        update(&mut guard);
      }
    }
  }
}

impl Clone for AssetLoader {
  fn clone(&self) -> Self {
    Self {
      context: self.context.clone(),
      fetcher: Arc::clone(&self.fetcher),
      cache: Arc::clone(&self.cache),
      diagnostics: self.diagnostics.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{Error, FetchError};
  use crate::resource::FetchedResource;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingFetcher {
    calls: AtomicUsize,
  }

  impl ResourceFetcher for CountingFetcher {
    fn fetch(&self, url: &str) -> crate::error::Result<FetchedResource> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err(Error::Fetch(FetchError::LoadFailed {
        url: url.to_string(),
        reason: "down".to_string(),
      }))
    }
  }

  #[test]
  fn exhausted_reference_is_cached_and_not_reprobed() {
    let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
    let ctx = ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com");
    let loader = AssetLoader::with_fetcher(ctx, Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>);

    let first = loader.load("/uploads/logo.png");
    assert!(first.placeholder);
    let fetches = fetcher.calls.load(Ordering::SeqCst);
    assert_eq!(fetches, 3, "three candidates before the placeholder");

    let second = loader.load("/uploads/logo.png");
    assert!(second.placeholder);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), fetches, "second load served from cache");
  }

  #[test]
  fn empty_reference_short_circuits_to_placeholder() {
    let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
    let ctx = ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com");
    let loader = AssetLoader::with_fetcher(ctx, Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>);

    let outcome = loader.load("");
    assert!(outcome.placeholder);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn invalidate_forces_a_reprobe() {
    let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
    let ctx = ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com");
    let loader = AssetLoader::with_fetcher(ctx, Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>);

    loader.load("/uploads/logo.png");
    loader.invalidate();
    loader.load("/uploads/logo.png");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
  }

  #[test]
  fn clones_share_the_outcome_cache() {
    let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
    let ctx = ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com");
    let loader = AssetLoader::with_fetcher(ctx, Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>);

    loader.load("/uploads/logo.png");
    let fetches = fetcher.calls.load(Ordering::SeqCst);
    loader.clone().load("/uploads/logo.png");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), fetches);
  }
}
