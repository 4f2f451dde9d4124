//! `mirrorcheck mirrors` - list the target list.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::{Mirror, TrustLevel};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::output::{print_structured, to_csv, OutputFormat};

#[derive(Tabled, Serialize)]
struct MirrorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Weight")]
    weight: i32,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "CDN")]
    cdn: bool,
    #[tabled(rename = "Prefixes")]
    prefixes: String,
}

impl From<&Mirror> for MirrorRow {
    fn from(m: &Mirror) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            weight: m.weight,
            country: m.country.clone(),
            cdn: m.cdn,
            prefixes: m.url_prefixes().join(" "),
        }
    }
}

pub async fn execute(ctx: Context) -> Result<()> {
    let targets = &ctx.config.targets;
    let mirrors = ctx
        .client()?
        .mirrors()
        .list(&targets.url, &targets.cdn_mirrors)
        .await?;

    if print_structured(ctx.output_format, &mirrors)? {
        return Ok(());
    }

    let rows: Vec<MirrorRow> = mirrors.iter().map(MirrorRow::from).collect();
    match ctx.output_format {
        OutputFormat::Csv => print!("{}", to_csv(&rows)?),
        _ => {
            println!("{}", Table::new(&rows).with(Style::rounded()));
            let hidden = mirrors.iter().filter(|m| m.trust() == TrustLevel::Hidden).count();
            println!();
            println!(
                "{}",
                format!("{} mirrors, {hidden} hidden", mirrors.len()).dimmed()
            );
        }
    }
    Ok(())
}
