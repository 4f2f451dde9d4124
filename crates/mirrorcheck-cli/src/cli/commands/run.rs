//! `mirrorcheck run` - check mirrors against the source.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::{MirrorChecker, RunSummary, Selection, TargetResult};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::{percent_cell, Context};
use crate::cli::args::RunArgs;
use crate::output::{print_structured, to_csv, OutputFormat};

#[derive(Tabled, Serialize)]
struct ResultRow {
    #[tabled(rename = "Mirror")]
    mirror: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Synced")]
    percent: String,
    #[tabled(rename = "Errors")]
    errors: usize,
}

impl ResultRow {
    fn new(result: &TargetResult, colored: bool) -> Self {
        Self {
            mirror: result.target_id.clone(),
            prefix: result.url_prefix.clone(),
            node: result.cdn_node_address.clone().unwrap_or_default(),
            percent: if colored {
                percent_cell(result.completion_percent).to_string()
            } else {
                format!("{:.3}", result.completion_percent)
            },
            errors: result.error_count,
        }
    }
}

pub async fn execute(ctx: Context, args: RunArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(dir) = args.report_dir {
        config.report_dir = Some(dir);
    }
    if args.exclude_hidden {
        config.targets.exclude_hidden = true;
    }
    if args.max_retries.is_some() {
        config.retry.max_retries = args.max_retries;
    }

    let selection = args.mirror.map_or(Selection::All, Selection::One);
    let summary = MirrorChecker::new(config)?.run(selection).await?;

    if print_structured(ctx.output_format, &summary.results)? {
        return Ok(());
    }

    match ctx.output_format {
        OutputFormat::Csv => {
            let rows: Vec<ResultRow> = summary.results.iter().map(|r| ResultRow::new(r, false)).collect();
            print!("{}", to_csv(&rows)?);
        }
        _ => print_pretty(&summary, ctx.verbose),
    }

    Ok(())
}

fn print_pretty(summary: &RunSummary, verbose: bool) {
    println!(
        "{} {} ({} sampled files, {} standards)",
        "Operation:".bold(),
        summary.operation.index.cyan(),
        summary.sampled_files,
        summary.standards
    );

    if summary.results.is_empty() {
        println!();
        println!("{}", "Nothing to check.".dimmed());
        return;
    }

    let rows: Vec<ResultRow> = summary.results.iter().map(|r| ResultRow::new(r, true)).collect();
    println!();
    println!("{}", Table::new(&rows).with(Style::rounded()));

    let complete = summary.results.iter().filter(|r| r.is_complete()).count();
    println!();
    println!(
        "{} {}/{} targets fully synced",
        "Summary:".bold(),
        complete.to_string().green(),
        summary.results.len()
    );

    if verbose {
        for result in summary.results.iter().filter(|r| !r.is_complete()) {
            println!();
            println!("{} {}", "Behind:".yellow().bold(), result.url_prefix);
            for record in result.records.iter().filter(|r| !r.matches) {
                let reason = record.failure.as_deref().unwrap_or("content differs");
                println!("  {} {} {}", "-".red(), record.standard.path, reason.dimmed());
            }
        }
    }

    if !summary.reports.is_empty() {
        println!();
        println!(
            "{}",
            format!("{} reports written", summary.reports.len()).dimmed()
        );
    }
}
