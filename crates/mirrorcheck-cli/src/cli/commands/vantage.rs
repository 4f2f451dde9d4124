//! `mirrorcheck vantage` - discover CDN edge nodes.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::VantagePointResolver;

use super::Context;
use crate::cli::args::VantageArgs;
use crate::output::{print_structured, OutputFormat};

pub async fn execute(ctx: Context, args: VantageArgs) -> Result<()> {
    let vantage = ctx.config.vantage.clone();
    let host = args.host.unwrap_or_else(|| vantage.default_host.clone());
    let resolver = VantagePointResolver::new(ctx.client()?, vantage);

    let nodes = if args.fallback {
        resolver.resolve_or_fallback(&host).await
    } else {
        resolver.resolve(&host).await?
    };

    if print_structured(ctx.output_format, &nodes)? {
        return Ok(());
    }

    match ctx.output_format {
        OutputFormat::Csv => {
            println!("node");
            for node in &nodes {
                println!("{node}");
            }
        }
        _ => {
            println!("{} {}", "Host:".bold(), host.cyan());
            if nodes.is_empty() {
                println!("  {}", "no edge nodes found".yellow());
            }
            for node in &nodes {
                println!("  {} {node}", "-".green());
            }
        }
    }
    Ok(())
}
