//! # mirrorcheck-cli
//!
//! Command-line interface for the mirror consistency checker.
//!
//! ## Features
//!
//! - **Runs**: check every mirror, or one by id, and publish the results
//! - **Probing tools**: inspect recent changes, fingerprint single files,
//!   discover CDN edge nodes
//! - **Configuration**: TOML file in the platform config directory
//! - **Multiple output formats**: Pretty tables, JSON, CSV, YAML

pub mod cli;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::run;
