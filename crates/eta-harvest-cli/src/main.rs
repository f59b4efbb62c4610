//! CLI application for harvesting e-invoicing portal listings.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, harvest, serve};

/// ETA invoice harvester - collect invoice listings from recorded portal pages
#[derive(Parser)]
#[command(name = "eta-harvest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every page of a recorded listing
    Harvest(harvest::HarvestArgs),

    /// Answer JSON requests from stdin against a recorded listing
    Serve(serve::ServeArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Harvest(args) => harvest::run(args, cli.config.as_deref()).await,
        Commands::Serve(args) => serve::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
