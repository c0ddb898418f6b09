use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::info;

use vault_agent::config::Config;
use vault_agent::daemon::Daemon;
use vault_agent::process_manager::{self, AgentStatus};
use vault_agent::vault::bitwarden::BitwardenVault;

#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control verbosity level (use -v, -vv, -vvv, or -vvvv for more verbose output)
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent in the foreground, blocking until shutdown.
    Run,
    /// Start the agent as a background process.
    Start,
    /// Stop the background agent.
    Stop,
    /// Restart the background agent.
    Restart,
    /// Report whether the agent is running.
    Status,
}

async fn run_foreground() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    info!("authenticating against vault");
    let vault = BitwardenVault::login(&config)
        .await
        .context("failed to authenticate vault client")?;

    let daemon = Daemon::new(config, Arc::new(vault));
    daemon.run_foreground().await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let foreground = matches!(cli.command, Commands::Run);
    vault_agent::logging::setup_logging(cli.verbose.log_level_filter(), foreground)
        .context("failed to initialize logging")?;

    let result = match cli.command {
        Commands::Run => {
            let runtime =
                tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(run_foreground())
        }
        Commands::Start => process_manager::start_agent_background(),
        Commands::Stop => process_manager::stop_agent(),
        Commands::Restart => {
            let runtime =
                tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(process_manager::restart_agent())
        }
        Commands::Status => {
            match process_manager::agent_status()? {
                AgentStatus::Running(pid) => println!("vault-agent is running (pid {pid})"),
                AgentStatus::NotRunning => println!("vault-agent is not running"),
            }
            Ok(())
        }
    };

    if let Err(ref e) = result {
        log::error!("vault-agent error: {e:?}");
    }

    result
}
