use std::future::Future;
use std::io;
use std::process::exit;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::signal::unix::{SignalKind, signal as unix_signal};

mod agent;
mod error;
mod loader;

#[derive(Debug, Parser)]
#[command(name = "packet-counter")]
#[command(about = "Counts packets on a network interface with an XDP program", long_about = None)]
struct Opt {
    /// Network interface to count packets on
    #[arg(short, long, value_name = "IFACE")]
    iface: String,
    /// Seconds between counter reads
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    interval_secs: u64,
    /// XDP attach mode
    #[arg(long, value_enum, default_value_t = loader::XdpMode::Skb)]
    xdp_mode: loader::XdpMode,
    /// Failed counter reads tolerated per tick before giving up
    #[arg(long, default_value_t = 0)]
    read_retries: u32,
    /// Initial delay between read retries; doubles on each attempt
    #[arg(long, value_name = "MILLIS", default_value_t = 200)]
    retry_backoff_ms: u64,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("packet-counter error: {err:#}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let opt = Opt::parse();

    let cfg = agent::AgentConfig {
        iface: opt.iface,
        poll_interval: Duration::from_secs(opt.interval_secs.max(1)),
        read_retries: opt.read_retries,
        retry_backoff: Duration::from_millis(opt.retry_backoff_ms),
    };
    // Handlers must be in place before the lifecycle starts; a signal during
    // resolve/load/attach still has to walk the detach-then-release path.
    let shutdown = shutdown_signal().context("failed to install signal handlers")?;
    let mut host = loader::XdpHost::new(opt.xdp_mode);

    agent::run(&mut host, &cfg, shutdown).await?;
    Ok(())
}

/// Registers SIGINT and SIGTERM streams immediately and returns a future that
/// completes when either arrives. A signal delivered between registration and
/// the first poll is buffered by the stream, not lost.
fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut interrupt = unix_signal(SignalKind::interrupt())?;
    let mut terminate = unix_signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("received SIGINT, shutting down"),
            _ = terminate.recv() => info!("received SIGTERM, shutting down"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_future_completes_on_sigterm() {
        let shutdown = shutdown_signal().expect("signal streams should install");

        // Raised before the future is ever polled; the registered stream must
        // still observe it.
        unsafe {
            libc::raise(libc::SIGTERM);
        }

        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .expect("shutdown future should complete after SIGTERM");
    }
}
