//! mirrorcheck - package mirror consistency checker
//!
//! Compares what mirrors and CDN nodes serve against the source repository.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mirrorcheck_cli::run().await
}
