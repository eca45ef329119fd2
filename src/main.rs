//! `reelcast` CLI - publish news articles as vertical reels

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reelcast")]
#[command(about = "Turn WordPress articles into Facebook and Instagram reels")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/reelcast/config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run publish cycles until interrupted
    Run,

    /// Run a single publish cycle and exit
    Once,

    /// Render cover art for a local photo (no network)
    Render {
        /// Photo to place in the photo region
        #[arg(short, long)]
        photo: Option<PathBuf>,

        /// Title text
        #[arg(short, long)]
        title: String,

        /// Category label
        #[arg(long, default_value = "Notícias")]
        category: String,

        /// Output JPEG path
        #[arg(short, long, default_value = "arte.jpg")]
        output: PathBuf,
    },

    /// Check ffmpeg, assets, config and credentials
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run => cmd::run::cmd_run(config_path).await?,
        Commands::Once => cmd::run::cmd_once(config_path).await?,
        Commands::Render {
            photo,
            title,
            category,
            output,
        } => {
            cmd::render::cmd_render(config_path, photo.as_deref(), &title, &category, &output)?;
        }
        Commands::Check => cmd::check::cmd_check(config_path).await?,
    }

    Ok(())
}
