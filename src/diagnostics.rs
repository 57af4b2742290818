//! Resolution diagnostics.
//!
//! Counters plus per-candidate failure records, collected by an
//! [`crate::loader::AssetLoader`] when a sink is attached. Serializable so
//! tooling can export a probe run as JSON.

use serde::Serialize;

/// Aggregate view of a loader's resolution activity.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ResolutionDiagnostics {
  /// References handed to `load`.
  pub requests: usize,
  /// Requests answered from the outcome cache.
  pub cache_hits: usize,
  /// Requests that walked the candidate chain.
  pub cache_misses: usize,
  /// Non-initial candidates tried across all requests.
  pub fallbacks: usize,
  /// References that exhausted their retry budget.
  pub exhausted: usize,
  /// One record per candidate that failed to load.
  pub failures: Vec<CandidateFailure>,
}

/// A single candidate that failed to load.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateFailure {
  pub reference: String,
  pub candidate: String,
  /// Position in the fallback sequence (0 = initial candidate).
  pub attempt: u8,
  pub reason: String,
}

impl ResolutionDiagnostics {
  pub fn record_failure(
    &mut self,
    reference: &str,
    candidate: &str,
    attempt: u8,
    reason: impl Into<String>,
  ) {
    self.failures.push(CandidateFailure {
      reference: reference.to_string(),
      candidate: candidate.to_string(),
      attempt,
      reason: reason.into(),
    });
  }
}
