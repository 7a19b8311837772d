use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logpuller")]
#[command(about = "Incremental web gateway log retrieval and forwarding", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve everything since the last checkpoint
    Run {
        /// Skip forwarding for this run even if enabled in the config
        #[arg(long)]
        no_forward: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the stored checkpoint
    Show,
    /// Overwrite the stored checkpoint (epoch seconds)
    Set { timestamp: i64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logpuller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = logpuller::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { no_forward }) => {
            let options = logpuller::cli::run::RunOptions { forward: !no_forward };
            logpuller::cli::run::run(config_path, options).await?;
        }
        None => {
            logpuller::cli::run::run(config_path, Default::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logpuller::cli::config::init(stdout)?;
            }
        },
        Some(Commands::Checkpoint { action }) => match action {
            CheckpointAction::Show => logpuller::cli::checkpoint::show(config_path)?,
            CheckpointAction::Set { timestamp } => {
                logpuller::cli::checkpoint::set(config_path, timestamp)?
            }
        },
    }

    Ok(())
}
