//! `mirrorcheck changes` - files changed on the source recently.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::sample::sample_change_set;
use mirrorcheck::ChangeManifest;
use serde::Serialize;

use super::Context;
use crate::cli::args::ChangesArgs;
use crate::output::{print_structured, to_csv, OutputFormat};

#[derive(Serialize)]
struct ChangeRow<'a> {
    kind: &'static str,
    path: &'a str,
}

pub async fn execute(ctx: Context, args: ChangesArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(days) = args.days {
        config.source.window_days = days;
    }
    config.validate()?;

    let client = ctx.client()?;
    if args.current {
        let manifest = client.changes(&config.change_source()).current().await?;
        return print_manifest(&ctx, &manifest);
    }

    let changes = client
        .changes(&config.change_source())
        .recent(config.window())
        .await?;

    if args.sample {
        let sampled = sample_change_set(&changes, config.source.max_packages);
        return print_paths(&ctx, &sampled);
    }

    let rows: Vec<ChangeRow<'_>> = changes
        .others
        .iter()
        .map(|p| ChangeRow { kind: "other", path: p })
        .chain(changes.packages.iter().map(|p| ChangeRow { kind: "package", path: p }))
        .collect();

    if print_structured(ctx.output_format, &changes)? {
        return Ok(());
    }

    match ctx.output_format {
        OutputFormat::Csv => print!("{}", to_csv(&rows)?),
        _ => {
            println!(
                "{} {}",
                "Newest manifest:".bold(),
                changes.newest_manifest.as_deref().unwrap_or("-").cyan()
            );
            println!(
                "{} {} packages, {} other files",
                "Changed:".bold(),
                changes.packages.len(),
                changes.others.len()
            );
            if ctx.verbose {
                println!();
                for row in &rows {
                    println!("  {} {}", format!("[{}]", row.kind).dimmed(), row.path);
                }
            }
        }
    }

    Ok(())
}

fn print_paths(ctx: &Context, paths: &[String]) -> Result<()> {
    if print_structured(ctx.output_format, paths)? {
        return Ok(());
    }

    match ctx.output_format {
        OutputFormat::Csv => {
            let rows: Vec<ChangeRow<'_>> = paths.iter().map(|p| ChangeRow { kind: "sampled", path: p }).collect();
            print!("{}", to_csv(&rows)?);
        }
        _ => {
            println!("{} {} files", "Sampled:".bold(), paths.len());
            for path in paths {
                println!("  {path}");
            }
        }
    }
    Ok(())
}

fn print_manifest(ctx: &Context, manifest: &ChangeManifest) -> Result<()> {
    if print_structured(ctx.output_format, manifest)? {
        return Ok(());
    }

    let rows: Vec<ChangeRow<'_>> = manifest
        .added
        .iter()
        .map(|f| ChangeRow { kind: "added", path: &f.path })
        .chain(manifest.deleted.iter().map(|f| ChangeRow { kind: "deleted", path: &f.path }))
        .collect();

    match ctx.output_format {
        OutputFormat::Csv => print!("{}", to_csv(&rows)?),
        _ => {
            println!(
                "{} {} (previous {}, {} bytes)",
                "Current:".bold(),
                manifest.current_timestamp.cyan(),
                manifest.previous_timestamp,
                manifest.total_size
            );
            for row in &rows {
                println!("  {} {}", format!("[{}]", row.kind).dimmed(), row.path);
            }
        }
    }
    Ok(())
}
