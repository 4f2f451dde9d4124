//! Concurrent mirror consistency runs.
//!
//! This crate drives a complete check on top of `mirrorcheck-client`:
//!
//! - **Pools**: the bounded [`WorkerPool`] and the fan-in [`Collector`]
//! - **Orchestration**: mirrors, URL prefixes and CDN nodes in [`orchestrator`]
//! - **Aggregation**: metric points from target results in [`aggregate`]
//! - **Sinks**: InfluxDB and log sinks in [`metrics`], operation stores in
//!   [`operation`], text reports in [`report`]
//! - **Runs**: configuration in [`config`] and the top-level [`MirrorChecker`]
//!
//! # Example
//!
//! ```rust,no_run
//! use mirrorcheck_runner::{CheckerConfig, MirrorChecker, Selection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CheckerConfig::load(std::path::Path::new("mirrorcheck.toml"))?;
//! let summary = MirrorChecker::new(config)?.run(Selection::All).await?;
//! println!("{} targets checked", summary.results.len());
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/mirrorcheck-runner/0.3.0")]

mod error;

pub mod aggregate;
pub mod checker;
pub mod config;
pub mod metrics;
pub mod operation;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod standard;

pub use aggregate::aggregate;
pub use checker::{MirrorChecker, RunSummary, Selection};
pub use config::{CheckerConfig, InfluxConfig, PoolConfig, RetrySettings, SourceConfig, TargetsConfig};
pub use error::{RunError, RunResult};
pub use metrics::{line_protocol, InfluxSink, LogSink, MetricsSink};
pub use operation::{JsonLinesOperationLog, OperationLog, TracingOperationLog};
pub use orchestrator::{CheckOrchestrator, RunProgress};
pub use pool::{Collector, WorkerPool};
pub use report::{render_report, report_file_name, write_report};
pub use standard::{StandardCache, StandardSet};
