//! Result printing shared by the commands.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// How a command prints its result
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tables and colored summaries
    #[default]
    #[value(alias = "table")]
    Pretty,
    Json,
    /// One row per result with a header line
    Csv,
    #[value(alias = "yml")]
    Yaml,
}

/// Print `value` as JSON or YAML; returns false for the other formats
pub fn print_structured<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Pretty | OutputFormat::Csv => return Ok(false),
    }
    Ok(true)
}

/// Render serializable rows as CSV with a header line
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(String::from_utf8(writer.into_inner()?)?)
}
