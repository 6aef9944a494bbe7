use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "snbt-translator",
    version,
    about = "Extract, translate and re-apply quest descriptions in SNBT files"
)]
struct Cli {
    /// Directory holding the .snbt quest files
    directory: PathBuf,

    /// Run a single phase: 1 extract, 2 translate, 3 apply (default: all)
    #[arg(short = 'p', long = "phase", value_parser = clap::value_parser!(u8).range(1..=3))]
    phase: Option<u8>,

    /// Catalog JSON path (default: all.json)
    #[arg(short = 'c', long = "catalog")]
    catalog: Option<String>,

    /// Model name or provider:model (e.g. openai:gpt-4o-mini)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Do not print per-file diffs in phase 3
    #[arg(long = "no-diff")]
    no_diff: bool,

    /// Disable colored diff output
    #[arg(long = "no-color")]
    no_color: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    snbt_translator::logging::init(cli.verbose)?;
    if cli.no_color {
        colored::control::set_override(false);
    }

    let summary = snbt_translator::run(snbt_translator::Config {
        directory: cli.directory,
        phase: cli.phase,
        catalog_path: cli.catalog,
        model: cli.model,
        key: cli.key,
        settings_path: cli.read_settings,
        show_diff: !cli.no_diff,
    })
    .await?;

    println!("{}", summary);
    Ok(())
}
