//! nicpoold — the network interface pool manager daemon.
//!
//! Assembles the provider, reconciler, and dispatcher around a JSON
//! state document: the resource graph is loaded into the in-memory
//! gateway, one or more notifications are dispatched, and the mutated
//! graph is written back. Real deployments swap the state-file gateway
//! for a cloud client implementing the same trait; the reconciliation
//! behavior is identical.
//!
//! # Usage
//!
//! ```text
//! nicpoold --state pool.json sweep
//! nicpoold --state pool.json handle --event lifecycle.json
//! nicpoold --state pool.json watch --interval 60
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use nicpool_events::{Dispatcher, Notification};
use nicpool_provider::{MemoryProvider, PoolFixture};
use nicpool_reconciler::WaitConfig;

#[derive(Parser)]
#[command(name = "nicpoold", about = "Network interface pool manager")]
struct Cli {
    /// JSON state document describing instances and interfaces.
    #[arg(long, global = true, default_value = "nicpool-state.json")]
    state: PathBuf,

    /// Pause between interface status polls, in milliseconds.
    #[arg(long, global = true, default_value = "1000")]
    poll_interval_ms: u64,

    /// Status polls before giving up on an interface.
    #[arg(long, global = true, default_value = "60")]
    poll_max_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch one notification against the state document.
    Handle {
        /// Notification JSON file ("-" reads stdin).
        #[arg(long)]
        event: PathBuf,
    },
    /// Run one reconciliation sweep over every pool.
    Sweep,
    /// Run periodic sweeps until interrupted.
    Watch {
        /// Seconds between sweeps.
        #[arg(long, default_value = "60")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nicpool=debug,nicpoold=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let wait = WaitConfig {
        interval: Duration::from_millis(cli.poll_interval_ms),
        max_attempts: cli.poll_max_attempts,
    };

    match cli.command {
        Command::Handle { event } => {
            let notification = read_notification(&event)?;
            dispatch_once(&cli.state, &wait, &notification).await
        }
        Command::Sweep => dispatch_once(&cli.state, &wait, &Notification::timer()).await,
        Command::Watch { interval } => watch(&cli.state, &wait, interval).await,
    }
}

/// Load the state document, dispatch one notification, persist the
/// result. Reconciliation failures are logged by the dispatcher; only
/// state-file problems surface as process errors.
async fn dispatch_once(
    state_path: &Path,
    wait: &WaitConfig,
    notification: &Notification,
) -> anyhow::Result<()> {
    let provider = Arc::new(load_provider(state_path)?);
    let dispatcher = Dispatcher::new(provider.clone()).with_wait_config(wait.clone());
    dispatcher.handle(notification).await;
    save_provider(state_path, &provider).await?;
    Ok(())
}

/// Periodic timer sweeps. The state document is re-read each tick so
/// external edits between sweeps are picked up.
async fn watch(state_path: &Path, wait: &WaitConfig, interval_secs: u64) -> anyhow::Result<()> {
    info!(
        state = %state_path.display(),
        interval = interval_secs,
        "watching; sweeping every tick"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        dispatch_once(state_path, wait, &Notification::timer()).await?;
    }
}

fn load_provider(path: &Path) -> anyhow::Result<MemoryProvider> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read state document {}: {e}", path.display()))?;
    let fixture: PoolFixture = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid state document {}: {e}", path.display()))?;
    Ok(MemoryProvider::from_fixture(fixture))
}

async fn save_provider(path: &Path, provider: &MemoryProvider) -> anyhow::Result<()> {
    let fixture = provider.fixture().await;
    let json = serde_json::to_string_pretty(&fixture)?;
    std::fs::write(path, json)
        .map_err(|e| anyhow::anyhow!("failed to write state document {}: {e}", path.display()))?;
    Ok(())
}

fn read_notification(path: &Path) -> anyhow::Result<Notification> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read event {}: {e}", path.display()))?
    };
    Ok(serde_json::from_str(&raw)?)
}
