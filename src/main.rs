pub mod types;
pub mod config;
pub mod error;
pub mod grid;
pub mod classify;
pub mod partition;
pub mod data;
pub mod processing;
pub mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the input points and render the density map
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Partition the input points and print a per-level summary
    Stats {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config } => {
            info!("Rendering map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Load points
            let loaded = data::load_points(&app_config)?;

            // 2. Partition
            let partition = processing::partition_points(&app_config.partition, &loaded.points)?;

            // 3. Render
            render::generate_map(&app_config, &partition.patches, &loaded.points)?;

            info!("Render complete!");
        }
        Commands::Stats { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let loaded = data::load_points(&app_config)?;
            let partition = processing::partition_points(&app_config.partition, &loaded.points)?;

            println!("malformed rows:    {}", loaded.malformed);
            print!("{}", partition.summary.report(&app_config.partition));
        }
    }

    Ok(())
}
