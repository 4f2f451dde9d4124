//! `mirrorcheck config` - configuration file management.

use anyhow::Result;
use colored::Colorize;
use mirrorcheck::CheckerConfig;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::output::print_structured;

pub fn execute(ctx: &Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(ctx),
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => init_config(ctx, force),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if print_structured(ctx.output_format, &ctx.config)? {
        return Ok(());
    }

    let source = if ctx.config_path.exists() {
        ctx.config_path.display().to_string()
    } else {
        "(defaults, no config file)".dimmed().to_string()
    };
    println!("{} {}", "# Source:".bold(), source);
    println!();
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}

fn init_config(ctx: &Context, force: bool) -> Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\n\
             Use --force to overwrite it.",
            path.display()
        );
    }

    CheckerConfig::default().save(path)?;
    println!("{} Wrote {}", "Success:".green().bold(), path.display().to_string().cyan());
    Ok(())
}
