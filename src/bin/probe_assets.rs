//! Resolve (and optionally probe) image references from backend data.
//!
//! Intended for content audits: feed it an export of blog posts or sponsors
//! (any JSON array of objects with an `image` field) or bare references on
//! the command line, and it prints the fallback chain each reference would
//! walk. With `--probe` it actually fetches candidates and reports which one
//! loads, so stale references can be found before readers see placeholders.

use clap::Parser;
use gtceuta_assets::{
  AssetConfig, AssetLoader, HttpFetcher, ResolutionContext, ResolutionDiagnostics, ResourceFetcher,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(name = "probe_assets", version, about = "Resolve and probe GT Ceuta image references")]
struct Args {
  /// Image references to resolve
  references: Vec<String>,

  /// JSON file holding an array of objects with an `image` field
  /// (blog post / sponsor exports)
  #[arg(long)]
  input: Option<PathBuf>,

  /// Page origin to resolve against (defaults to GTC_PAGE_ORIGIN)
  #[arg(long)]
  page_origin: Option<String>,

  /// API base URL serving /uploads (defaults to GTC_API_BASE_URL)
  #[arg(long)]
  api_base: Option<String>,

  /// Fetch each candidate and report the first that loads
  #[arg(long)]
  probe: bool,

  /// Emit a JSON report instead of text
  #[arg(long)]
  json: bool,

  /// Per-request timeout in seconds for --probe
  #[arg(long, default_value_t = 30)]
  timeout_secs: u64,
}

#[derive(Serialize)]
struct ReferenceReport {
  reference: String,
  candidates: Vec<String>,
  /// Winning URL when probed; absent in dry runs.
  #[serde(skip_serializing_if = "Option::is_none")]
  resolved: Option<String>,
  placeholder: bool,
}

#[derive(Serialize)]
struct ProbeReport {
  page_origin: String,
  api_base_url: String,
  references: Vec<ReferenceReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  diagnostics: Option<ResolutionDiagnostics>,
}

fn main() -> ExitCode {
  let args = Args::parse();

  let mut references = args.references.clone();
  if let Some(path) = &args.input {
    match read_references(path) {
      Ok(mut from_file) => references.append(&mut from_file),
      Err(message) => {
        eprintln!("probe_assets: {}", message);
        return ExitCode::from(2);
      }
    }
  }
  if references.is_empty() {
    eprintln!("probe_assets: no references given (positional args or --input)");
    return ExitCode::from(2);
  }

  let mut config = AssetConfig::from_env();
  if let Some(origin) = args.page_origin {
    config = config.with_page_origin(origin);
  }
  if let Some(base) = args.api_base {
    config = config.with_api_base_url(base);
  }
  config = config.with_fetch_timeout(std::time::Duration::from_secs(args.timeout_secs));

  let context = ResolutionContext::from_config(&config);

  let (loader, diagnostics) = if args.probe {
    let fetcher: Arc<dyn ResourceFetcher> =
      Arc::new(HttpFetcher::new().with_timeout(config.fetch_timeout));
    let mut loader = AssetLoader::with_fetcher(context.clone(), fetcher);
    let sink = Arc::new(Mutex::new(ResolutionDiagnostics::default()));
    loader.set_diagnostics_sink(Some(Arc::clone(&sink)));
    (Some(loader), Some(sink))
  } else {
    (None, None)
  };

  let mut any_placeholder = false;
  let mut reports = Vec::with_capacity(references.len());
  for reference in &references {
    let candidates = context.candidate_chain(reference);
    let (resolved, placeholder) = match &loader {
      Some(loader) => {
        let outcome = loader.load(reference);
        let resolved = (!outcome.placeholder).then(|| outcome.url.clone());
        (resolved, outcome.placeholder)
      }
      // Dry run: an empty reference is the only statically-known exhaustion.
      None => (None, candidates.len() == 1),
    };
    any_placeholder |= placeholder;
    reports.push(ReferenceReport {
      reference: reference.clone(),
      candidates,
      resolved,
      placeholder,
    });
  }

  let report = ProbeReport {
    page_origin: context.page_origin().to_string(),
    api_base_url: context.api_base_url().to_string(),
    references: reports,
    diagnostics: diagnostics.and_then(|sink| sink.lock().ok().map(|guard| guard.clone())),
  };

  if args.json {
    match serde_json::to_string_pretty(&report) {
      Ok(json) => println!("{}", json),
      Err(err) => {
        eprintln!("probe_assets: failed to serialize report: {}", err);
        return ExitCode::from(2);
      }
    }
  } else {
    print_text_report(&report, args.probe);
  }

  if any_placeholder {
    ExitCode::from(1)
  } else {
    ExitCode::SUCCESS
  }
}

fn read_references(path: &PathBuf) -> Result<Vec<String>, String> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
  let value: serde_json::Value =
    serde_json::from_str(&raw).map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;

  let records = value
    .as_array()
    .ok_or_else(|| format!("{}: expected a JSON array of records", path.display()))?;

  Ok(
    records
      .iter()
      .filter_map(|record| record.get("image").and_then(|v| v.as_str()))
      .map(str::to_string)
      .collect(),
  )
}

fn print_text_report(report: &ProbeReport, probed: bool) {
  println!(
    "Resolving against page origin {} (API base {})",
    report.page_origin, report.api_base_url
  );
  for entry in &report.references {
    let label = if entry.reference.is_empty() { "(empty)" } else { entry.reference.as_str() };
    println!("\n{}", label);
    for (idx, candidate) in entry.candidates.iter().enumerate() {
      println!("  {}. {}", idx + 1, candidate);
    }
    match (&entry.resolved, entry.placeholder, probed) {
      (Some(url), _, _) => println!("  -> loaded from {}", url),
      (None, true, true) => println!("  -> exhausted, placeholder pinned"),
      (None, true, false) => println!("  -> placeholder (empty reference)"),
      (None, false, _) => {}
    }
  }
  if let Some(diag) = &report.diagnostics {
    println!(
      "\n{} request(s), {} fallback(s), {} exhausted, {} failed candidate(s)",
      diag.requests,
      diag.fallbacks,
      diag.exhausted,
      diag.failures.len()
    );
    for failure in &diag.failures {
      eprintln!("  {} (attempt {}): {}", failure.candidate, failure.attempt, failure.reason);
    }
  }
}
