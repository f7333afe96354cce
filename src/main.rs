//! Object Cache Shell
//!
//! Reads cache commands from stdin and writes one JSON line per command.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use object_cache::{spawn_cleanup_task, Config, Shell};

/// Main entry point for the object cache shell.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build one memory node per configured server and a facade over them
/// 4. Start background expiration sweep
/// 5. Serve commands until EOF or Ctrl+C
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var.
    // Logs go to stderr so stdout carries only command replies.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "object_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting object cache shell");

    let config = Config::from_env().context("invalid cache configuration")?;
    info!(
        "Configuration loaded: buckets={}, site_id={}, multisite={}, cleanup_interval={}s",
        config.servers.len(),
        config.site_id,
        config.multisite,
        config.cleanup_interval
    );

    let mut shell = Shell::from_config(&config).context("failed to build server pool")?;
    info!("{} memory nodes initialized", shell.nodes().len());

    let cleanup_handle = spawn_cleanup_task(shell.nodes().to_vec(), config.cleanup_interval);
    info!("Background expiration sweep started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read command")? else {
                    info!("End of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = shell.run_line(&line);
                stdout.write_all(format!("{reply}\n").as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    shell.cache().close();
    cleanup_handle.abort();
    warn!("Cleanup task aborted");
    info!("Shell shutdown complete");
    Ok(())
}
