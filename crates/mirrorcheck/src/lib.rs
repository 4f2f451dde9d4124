//! Mirror and CDN consistency checker for package repositories.
//!
//! A run resolves the files that changed on the source repository recently,
//! fingerprints a sample of them on the source, and compares those
//! fingerprints with what every mirror (and every CDN edge node) serves.
//! Each fingerprint costs at most two byte-range requests.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mirrorcheck::{CheckerConfig, MirrorChecker, Selection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = MirrorChecker::new(CheckerConfig::default())?;
//!     let summary = checker.run(Selection::All).await?;
//!
//!     for result in &summary.results {
//!         println!("{} {:.3}%", result.url_prefix, result.completion_percent);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Single files can be fingerprinted directly:
//!
//! ```rust,no_run
//! use mirrorcheck::{MirrorClient, ProbeTarget};
//!
//! # async fn example() -> mirrorcheck::Result<()> {
//! let client = MirrorClient::new()?;
//! let target = ProbeTarget::new("https://mirror.example.org/deepin/");
//! let fp = client.fingerprints().fetch(&target, "dists/apricot/Release").await?;
//! println!("{} bytes, digest {}", fp.byte_size, fp.digest_hex());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

#![doc(html_root_url = "https://docs.rs/mirrorcheck/0.3.0")]

// Re-export core types
pub use mirrorcheck_core::*;

// Re-export client
pub use mirrorcheck_client::{
    api, retry, ChangeFilter, ChangeSource, ContentRange, MirrorClient, MirrorClientBuilder,
    ProbeTarget, Profile, RetryConfig, VantageCache, VantageConfig, VantagePointResolver,
};

// Re-export runs
pub use mirrorcheck_runner::{
    aggregate, CheckOrchestrator, CheckerConfig, InfluxConfig, MirrorChecker, MetricsSink,
    OperationLog, RunError, RunResult, RunSummary, Selection, StandardSet,
};
pub use mirrorcheck_runner as runner;

// Re-export runtime for convenience
pub use tokio;
pub use serde;
pub use serde_json;
