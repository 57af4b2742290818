pub mod config;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod presenter;
pub mod resolver;
pub mod resource;

pub use error::{Error, FetchError, Result};

pub use config::{AssetConfig, PLACEHOLDER_IMAGE, UPLOADS_PREFIX};
pub use diagnostics::{CandidateFailure, ResolutionDiagnostics};
pub use loader::{AssetLoader, ResolvedAsset};
pub use presenter::ImagePresenter;
pub use resolver::{NextCandidate, ResolutionContext};
pub use resource::{FetchedResource, HttpFetcher, ResourceFetcher};
