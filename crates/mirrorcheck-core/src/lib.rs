//! Core types and primitives for the mirror consistency checker.
//!
//! This crate provides the foundational pieces shared across the workspace:
//!
//! - **Types**: change manifests, fingerprints, comparison records, target
//!   results, mirrors and metric points
//! - **Errors**: a single [`CheckError`] with a crate-wide [`Result`]
//! - **Hashing**: the bounded two-window digest in [`hash`]
//! - **Sampling**: probe-set selection in [`sample`]
//!
//! # Example
//!
//! ```rust
//! use mirrorcheck_core::hash::{digest_content, windows};
//!
//! let (first, second) = windows(12_000);
//! assert_eq!(first, 0..4096);
//! assert_eq!(second, Some(7904..12_000));
//! assert_eq!(digest_content(&[0u8; 12_000]).len(), 32);
//! ```

#![doc(html_root_url = "https://docs.rs/mirrorcheck-core/0.3.0")]

mod error;
pub mod hash;
pub mod sample;
pub mod types;

pub use error::{CheckError, Result};
pub use types::*;
