//! Config command: inspect and create the harvest settings file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use console::style;

use eta_harvest_core::HarvestConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the effective harvest settings
    Show(ShowArgs),

    /// Write a settings file with every section at its default
    Init(InitArgs),

    /// Show where the settings file is looked up
    Path,
}

/// Top-level sections of the settings file.
#[derive(Clone, Copy, ValueEnum)]
enum Section {
    Portal,
    Cache,
    Pagination,
    Timing,
    Extraction,
}

impl Section {
    fn key(self) -> &'static str {
        match self {
            Section::Portal => "portal",
            Section::Cache => "cache",
            Section::Pagination => "pagination",
            Section::Timing => "timing",
            Section::Extraction => "extraction",
        }
    }
}

#[derive(Args)]
struct ShowArgs {
    /// Print only this section
    #[arg(short, long, value_enum)]
    section: Option<Section>,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show(show_args) => show_config(show_args, config_path),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Path => show_path(),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eta-harvest")
        .join("config.json")
}

/// Configuration for a command: the explicit file, else the default file
/// when it exists, else built-in defaults.
pub fn load(config_path: Option<&str>) -> anyhow::Result<HarvestConfig> {
    if let Some(path) = config_path {
        return HarvestConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        Ok(HarvestConfig::from_file(&default_path)?)
    } else {
        Ok(HarvestConfig::default())
    }
}

fn show_config(args: ShowArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let default_path = default_config_path();
    match config_path {
        Some(path) => println!("{} Settings from {}", style("ℹ").blue(), path),
        None if default_path.exists() => {
            println!("{} Settings from {}", style("ℹ").blue(), default_path.display())
        }
        None => println!(
            "{} No settings file found, showing built-in harvest defaults.",
            style("ℹ").blue()
        ),
    }
    let config = load(config_path)?;

    let Some(section) = args.section else {
        print_summary(&config);
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    };

    let value = serde_json::to_value(&config)?;
    let body = value
        .get(section.key())
        .ok_or_else(|| anyhow::anyhow!("Section '{}' missing from settings", section.key()))?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ section.key(): body }))?);

    Ok(())
}

fn print_summary(config: &HarvestConfig) {
    let rows = [
        ("portal", format!("{} ({} listing tokens)", config.portal.domain, config.portal.listing_tokens.len())),
        ("cache", format!("captures fresh for {} ms", config.cache.freshness_ms)),
        (
            "pagination",
            format!(
                "up to {} pages, stop after {} stuck or {} empty",
                config.pagination.max_pages,
                config.pagination.max_stuck_pages,
                config.pagination.max_empty_pages
            ),
        ),
        (
            "timing",
            format!("settle {} ms, pacing {} ms", config.timing.settle_ms, config.timing.pacing_ms),
        ),
        (
            "extraction",
            format!("tax rate {}, currency {}", config.extraction.tax_rate, config.extraction.default_currency),
        ),
    ];
    for (section, summary) in rows {
        println!("  {:<11} {}", style(section).cyan(), summary);
    }
    println!();
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Settings file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    HarvestConfig::default().save(&output_path)?;

    println!(
        "{} Created harvest settings at {}",
        style("✓").green(),
        output_path.display()
    );
    println!("  Sections: portal, cache, pagination, timing, extraction");

    Ok(())
}

fn show_path() -> anyhow::Result<()> {
    let config_path = default_config_path();

    println!("Harvest settings file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'eta-harvest config init' to write the default settings, then edit the sections you need.");
    }

    Ok(())
}
