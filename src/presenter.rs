//! Per-image fallback state machine.
//!
//! One `ImagePresenter` owns the load/error state for a single image slot.
//! The rendering surface reports plain load/error events; the presenter
//! advances through the resolver's candidate sequence and pins the
//! placeholder once the retry budget is spent. All transitions are
//! synchronous state updates with no I/O, so the retry policy is unit
//! testable without any rendering surface.

use crate::resolver::ResolutionContext;

/// Fallback state for one image reference.
#[derive(Debug, Clone)]
pub struct ImagePresenter {
  reference: String,
  current: String,
  attempt: u8,
  loaded: bool,
  exhausted: bool,
}

impl ImagePresenter {
  /// Create a presenter for `reference`, computing the initial candidate.
  ///
  /// Empty references start pre-exhausted with the placeholder pinned, so
  /// no error event ever advances them.
  pub fn new(reference: impl Into<String>, context: &ResolutionContext) -> Self {
    let reference = reference.into();
    let current = context.initial_candidate(&reference);
    let exhausted = reference.trim().is_empty();
    Self {
      reference,
      current,
      attempt: 0,
      loaded: false,
      exhausted,
    }
  }

  /// Replace the underlying reference, resetting the attempt counter and
  /// recomputing the candidate. This is the only way out of exhaustion.
  pub fn set_reference(&mut self, reference: impl Into<String>, context: &ResolutionContext) {
    *self = Self::new(reference, context);
  }

  /// URL the rendering surface should currently display.
  pub fn current_candidate(&self) -> &str {
    &self.current
  }

  /// The raw reference this presenter resolves.
  pub fn reference(&self) -> &str {
    &self.reference
  }

  /// Position in the fallback sequence (0 until the first error).
  pub fn attempt(&self) -> u8 {
    self.attempt
  }

  pub fn is_loaded(&self) -> bool {
    self.loaded
  }

  pub fn is_exhausted(&self) -> bool {
    self.exhausted
  }

  /// Record a load-success event for the current candidate.
  pub fn note_loaded(&mut self) {
    self.loaded = true;
  }

  /// Record a load-error event for the current candidate and advance to the
  /// next one. Once exhausted the placeholder stays pinned and further
  /// errors are ignored.
  pub fn note_error(&mut self, context: &ResolutionContext) {
    if self.exhausted {
      return;
    }
    self.loaded = false;

    let next = context.next_candidate(&self.reference, &self.current, self.attempt);
    self.current = next.url;
    if next.exhausted {
      self.exhausted = true;
    } else {
      self.attempt = self.attempt.saturating_add(1);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::PLACEHOLDER_IMAGE;

  fn production() -> ResolutionContext {
    ResolutionContext::new("https://gtceuta.com", "https://api.gtceuta.com")
  }

  #[test]
  fn walks_the_full_fallback_sequence_then_pins_placeholder() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("/uploads/logo.png", &ctx);
    assert_eq!(presenter.current_candidate(), "/uploads/logo.png");

    presenter.note_error(&ctx);
    assert_eq!(
      presenter.current_candidate(),
      "https://api.gtceuta.com/uploads/logo.png"
    );
    assert_eq!(presenter.attempt(), 1);

    presenter.note_error(&ctx);
    assert_eq!(
      presenter.current_candidate(),
      "https://gtceuta.com/uploads/logo.png"
    );
    assert_eq!(presenter.attempt(), 2);

    presenter.note_error(&ctx);
    assert_eq!(presenter.current_candidate(), PLACEHOLDER_IMAGE);
    assert!(presenter.is_exhausted());
  }

  #[test]
  fn exhaustion_is_sticky() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("/uploads/logo.png", &ctx);
    for _ in 0..6 {
      presenter.note_error(&ctx);
    }
    assert!(presenter.is_exhausted());
    assert_eq!(presenter.current_candidate(), PLACEHOLDER_IMAGE);
    assert_eq!(presenter.attempt(), 2);
  }

  #[test]
  fn empty_reference_starts_pre_exhausted() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("", &ctx);
    assert!(presenter.is_exhausted());
    assert_eq!(presenter.current_candidate(), PLACEHOLDER_IMAGE);

    // Error events on a pre-exhausted presenter are no-ops.
    presenter.note_error(&ctx);
    assert_eq!(presenter.current_candidate(), PLACEHOLDER_IMAGE);
    assert_eq!(presenter.attempt(), 0);
  }

  #[test]
  fn load_success_marks_loaded() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("https://cdn.example.com/a.png", &ctx);
    presenter.note_loaded();
    assert!(presenter.is_loaded());
  }

  #[test]
  fn an_error_after_success_clears_loaded() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("/uploads/a.png", &ctx);
    presenter.note_loaded();
    presenter.note_error(&ctx);
    assert!(!presenter.is_loaded());
  }

  #[test]
  fn changing_the_reference_resets_all_state() {
    let ctx = production();
    let mut presenter = ImagePresenter::new("/uploads/a.png", &ctx);
    presenter.note_error(&ctx);
    presenter.note_error(&ctx);
    presenter.note_error(&ctx);
    assert!(presenter.is_exhausted());

    presenter.set_reference("/uploads/b.png", &ctx);
    assert!(!presenter.is_exhausted());
    assert_eq!(presenter.attempt(), 0);
    assert_eq!(presenter.current_candidate(), "/uploads/b.png");
  }
}
