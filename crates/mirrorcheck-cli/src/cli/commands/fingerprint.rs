//! `mirrorcheck fingerprint` - fingerprint one file.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::{Fingerprint, ProbeTarget};
use serde::Serialize;

use super::Context;
use crate::cli::args::FingerprintArgs;
use crate::output::{print_structured, to_csv, OutputFormat};

#[derive(Serialize)]
struct Comparison<'a> {
    observed: &'a Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    standard: Option<&'a Fingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<bool>,
}

#[derive(Serialize)]
struct FingerprintRow<'a> {
    path: &'a str,
    url: &'a str,
    size: u64,
    digest: String,
    last_modified: &'a str,
}

impl<'a> From<&'a Fingerprint> for FingerprintRow<'a> {
    fn from(fp: &'a Fingerprint) -> Self {
        Self {
            path: &fp.path,
            url: &fp.source_url,
            size: fp.byte_size,
            digest: fp.digest_hex(),
            last_modified: fp.last_modified.as_deref().unwrap_or(""),
        }
    }
}

pub async fn execute(ctx: Context, args: FingerprintArgs) -> Result<()> {
    let client = ctx.client()?;
    let prefix = args.url.unwrap_or_else(|| ctx.config.source.url.clone());
    let target = match &args.node {
        Some(node) => ProbeTarget::cdn_node(&prefix, node)?,
        None => ProbeTarget::new(prefix),
    };

    let observed = client.fingerprints().fetch(&target, &args.path).await?;
    let standard = if args.compare {
        let source = ProbeTarget::new(ctx.config.source.url.clone());
        Some(client.fingerprints().fetch(&source, &args.path).await?)
    } else {
        None
    };

    let comparison = Comparison {
        observed: &observed,
        standard: standard.as_ref(),
        matches: standard.as_ref().map(|s| *s == observed),
    };
    if print_structured(ctx.output_format, &comparison)? {
        return Ok(());
    }

    match ctx.output_format {
        OutputFormat::Csv => {
            let mut rows = vec![FingerprintRow::from(&observed)];
            rows.extend(standard.as_ref().map(FingerprintRow::from));
            print!("{}", to_csv(&rows)?);
        }
        _ => {
            print_fingerprint("Observed", &observed);
            if let Some(standard) = &standard {
                println!();
                print_fingerprint("Source", standard);
                println!();
                if *standard == observed {
                    println!("{}", "Fingerprints match".green().bold());
                } else {
                    println!("{}", "Fingerprints differ".red().bold());
                }
            }
        }
    }
    Ok(())
}

fn print_fingerprint(label: &str, fp: &Fingerprint) {
    println!("{} {}", format!("{label}:").bold(), fp.source_url.cyan());
    println!("  {} {}", "Path:".bold(), fp.path);
    println!("  {} {} bytes", "Size:".bold(), fp.byte_size);
    println!("  {} {}", "Digest:".bold(), fp.digest_hex());
    println!(
        "  {} {}",
        "Last-Modified:".bold(),
        fp.last_modified.as_deref().unwrap_or("-")
    );
}
