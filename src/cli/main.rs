//! CLI binary entry point for edd-export

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use edd_export::cli::commands::export::{ExportArgs, handle_export};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edd-export")]
#[command(about = "Download a Study CSV from an EDD instance")]
#[command(version)]
struct Cli {
    /// The EDD instance study slug to download
    slug: String,
    /// Username for login to the EDD instance (default: current OS user)
    #[arg(long)]
    username: Option<String>,
    /// EDD instance server, as a host name or base URL (default: edd.jbei.org)
    #[arg(long)]
    server: Option<String>,
    /// Output file path (default: <slug>.csv in the configured output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of streamed lines parsed per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Don't write the leading row-number column
    #[arg(long)]
    no_index: bool,
    /// Don't show a progress bar
    #[arg(long)]
    no_progress: bool,
    /// Configuration file (default: .edd-export.toml in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::try_from_default_env()?
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::try_new(format!("edd_export={level},warn"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Warning: {}", e);
    }

    let args = ExportArgs {
        slug: cli.slug,
        username: cli.username,
        server: cli.server,
        output: cli.output,
        batch_size: cli.batch_size,
        no_index: cli.no_index,
        no_progress: cli.no_progress,
        config: cli.config,
    };

    if let Err(e) = handle_export(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
