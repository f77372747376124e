//! webstage CLI - staging of hosted web application deployments

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use webstage::commands;

/// webstage - stage web application artifacts into per-deployment temp directories
#[derive(Debug, Parser)]
#[command(name = "webstage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host root directory (holds webstage.toml and the work directory)
    #[arg(short = 'H', long, global = true)]
    host_root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stage an artifact and print the resulting layout
    Stage(commands::stage::StageArgs),

    /// Tear down the temp directory of an artifact
    Clean(commands::clean::CleanArgs),

    /// Print the resolved work directory
    Workdir,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let host_root = if let Some(ref path) = cli.host_root {
        camino::Utf8PathBuf::from(path)
    } else {
        std::env::current_dir()
            .ok()
            .and_then(|p| camino::Utf8PathBuf::try_from(p).ok())
            .unwrap_or_else(|| camino::Utf8PathBuf::from("."))
    };

    match cli.command {
        Commands::Stage(args) => commands::stage::run(&host_root, args),
        Commands::Clean(args) => commands::clean::run(&host_root, args),
        Commands::Workdir => commands::workdir::run(&host_root),
    }
}
