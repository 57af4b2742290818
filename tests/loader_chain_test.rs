//! Loader behavior over the candidate chain, driven by a mock fetcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gtceuta_assets::{
  AssetLoader, Error, FetchedResource, ResolutionContext, ResolutionDiagnostics, ResourceFetcher,
  PLACEHOLDER_IMAGE,
};

#[derive(Clone, Default)]
struct MockFetcher {
  responses: Arc<Mutex<HashMap<String, FetchedResource>>>,
}

impl MockFetcher {
  fn with_bytes(self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
    self.responses.lock().unwrap().insert(
      url.to_string(),
      FetchedResource::with_final_url(
        bytes,
        content_type.map(str::to_string),
        Some(url.to_string()),
      ),
    );
    self
  }

  fn with_png(self, url: &str) -> Self {
    self.with_bytes(url, vec![0x89, b'P', b'N', b'G'], Some("image/png"))
  }

  fn with_html(self, url: &str, body: &str) -> Self {
    self.with_bytes(url, body.as_bytes().to_vec(), Some("text/html"))
  }
}

impl ResourceFetcher for MockFetcher {
  fn fetch(&self, url: &str) -> gtceuta_assets::Result<FetchedResource> {
    self
      .responses
      .lock()
      .unwrap()
      .get(url)
      .cloned()
      .ok_or_else(|| Error::Other(format!("no mock response for {url}")))
  }
}

fn production() -> ResolutionContext {
  ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com")
}

fn loader_with(fetcher: MockFetcher) -> (AssetLoader, Arc<Mutex<ResolutionDiagnostics>>) {
  let mut loader = AssetLoader::with_fetcher(production(), Arc::new(fetcher));
  let sink = Arc::new(Mutex::new(ResolutionDiagnostics::default()));
  loader.set_diagnostics_sink(Some(Arc::clone(&sink)));
  (loader, sink)
}

#[test]
fn first_working_candidate_wins() {
  let fetcher = MockFetcher::default().with_png("/uploads/logo.png");
  let (loader, sink) = loader_with(fetcher);

  let outcome = loader.load("/uploads/logo.png");
  assert!(!outcome.placeholder);
  assert_eq!(outcome.url, "/uploads/logo.png");
  assert_eq!(outcome.attempts, 1);
  assert!(sink.lock().unwrap().failures.is_empty());
}

#[test]
fn loader_falls_through_to_a_later_candidate() {
  // Only the page-origin form of the reference actually serves the image.
  let fetcher = MockFetcher::default().with_png("https://gtceuta.com/uploads/logo.png");
  let (loader, sink) = loader_with(fetcher);

  let outcome = loader.load("/uploads/logo.png");
  assert!(!outcome.placeholder);
  assert_eq!(outcome.url, "https://gtceuta.com/uploads/logo.png");
  assert_eq!(outcome.attempts, 3);

  let diag = sink.lock().unwrap();
  assert_eq!(diag.failures.len(), 2, "one record per failed candidate");
  assert_eq!(diag.fallbacks, 2);
  assert_eq!(diag.exhausted, 0);
}

#[test]
fn html_error_page_does_not_satisfy_a_candidate() {
  // A misconfigured server answers 200 with an HTML body on every URL.
  let fetcher = MockFetcher::default()
    .with_html("/uploads/logo.png", "<html>not found</html>")
    .with_html("https://api.gtceuta.com/uploads/logo.png", "<html>not found</html>")
    .with_html("https://gtceuta.com/uploads/logo.png", "<html>not found</html>");
  let (loader, sink) = loader_with(fetcher);

  let outcome = loader.load("/uploads/logo.png");
  assert!(outcome.placeholder);
  assert_eq!(outcome.url, PLACEHOLDER_IMAGE);

  let diag = sink.lock().unwrap();
  assert_eq!(diag.exhausted, 1);
  assert!(diag.failures.iter().all(|f| f.reason.contains("text/html")));
}

#[test]
fn diagnostics_count_cache_hits() {
  let fetcher = MockFetcher::default().with_png("/uploads/logo.png");
  let (loader, sink) = loader_with(fetcher);

  loader.load("/uploads/logo.png");
  loader.load("/uploads/logo.png");

  let diag = sink.lock().unwrap();
  assert_eq!(diag.requests, 2);
  assert_eq!(diag.cache_hits, 1);
  assert_eq!(diag.cache_misses, 1);
}

#[test]
fn data_url_reference_loads_inline() {
  // data: references resolve to themselves; the mock serves the decoded form.
  let reference = "data:image/png;base64,iVBORw0KGgo=";
  let fetcher = MockFetcher::default().with_bytes(
    reference,
    vec![0x89, b'P', b'N', b'G'],
    Some("image/png"),
  );
  let (loader, _sink) = loader_with(fetcher);

  let outcome = loader.load(reference);
  assert!(!outcome.placeholder);
  assert_eq!(outcome.attempts, 1);
}

#[test]
fn exhaustion_reports_reference_and_attempt_positions() {
  let (loader, sink) = loader_with(MockFetcher::default());

  let outcome = loader.load("/uploads/missing.png");
  assert!(outcome.placeholder);
  assert_eq!(outcome.attempts, 3);

  let diag = sink.lock().unwrap();
  let attempts: Vec<u8> = diag.failures.iter().map(|f| f.attempt).collect();
  assert_eq!(attempts, vec![0, 1, 2]);
  assert!(diag.failures.iter().all(|f| f.reference == "/uploads/missing.png"));
}
