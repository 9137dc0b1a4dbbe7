mod cmd_config;
mod cmd_run;
mod cmd_status;
mod cmd_sync;
mod cmd_tombstones;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, DEFAULT_CONFIG_PATH};
use mediasweep_core::RunMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mediasweep",
    version,
    about = "Retention and disk-pressure cleanup for Matrix media"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync uploads, apply one eviction policy, post a summary
    Run {
        /// Eviction policy to apply
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Report what would be evicted without deleting anything
        #[arg(long)]
        dry_run: bool,
        /// Post the summary even if it duplicates the last one or deleted nothing
        #[arg(long)]
        force_notify: bool,
        /// Skip ingestion and evict from the ledger as it stands
        #[arg(long)]
        skip_sync: bool,
    },
    /// Record media uploads from recent room history
    Sync,
    /// Show ledger contents and disk utilization
    Status,
    /// Print the effective configuration with secrets masked
    Config,
    /// List recorded evictions
    Tombstones {
        /// Show only the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Retention,
    Pressure,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Retention => RunMode::Retention,
            ModeArg::Pressure => RunMode::Pressure,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load(&cli.config)?;

    match cli.cmd {
        Command::Run {
            mode,
            dry_run,
            force_notify,
            skip_sync,
        } => cmd_run::execute(cmd_run::RunParams {
            config: &config,
            mode: mode.into(),
            dry_run,
            force_notify,
            skip_sync,
        }),
        Command::Sync => cmd_sync::execute(&config),
        Command::Status => cmd_status::execute(&config),
        Command::Config => cmd_config::execute(&config, &cli.config),
        Command::Tombstones { limit } => cmd_tombstones::execute(&config, limit),
    }
}
