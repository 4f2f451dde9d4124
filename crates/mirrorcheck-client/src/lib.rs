//! HTTP client for probing package mirrors.
//!
//! This crate provides the [`MirrorClient`] used to fingerprint files with
//! byte-range requests, resolve recent changes from a source repository,
//! fetch the target list and discover CDN edge nodes.

#![doc(html_root_url = "https://docs.rs/mirrorcheck-client/0.3.0")]

mod client;
mod config;
pub mod api;
pub mod retry;

pub use api::{
    ChangeFilter, ChangeSource, ContentRange, ProbeTarget, VantageCache, VantageConfig,
    VantagePointResolver,
};
pub use client::{MirrorClient, MirrorClientBuilder};
pub use config::*;
pub use mirrorcheck_core::{CheckError, Result};
pub use retry::{HostTimeoutTracker, RetryPolicy};
