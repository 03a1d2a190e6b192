use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use tokio::time;

use crate::error::AgentError;

/// Everything the controller needs from the packet-counting host.
///
/// The lifecycle logic below is written against this trait so it can be
/// exercised without a kernel; [`crate::loader::XdpHost`] is the real
/// implementation backed by aya.
pub trait CounterHost {
    /// A loaded routine image together with its bound counter handle.
    type Image;
    /// Proof that the routine is installed on an interface.
    type Link;

    /// Maps an interface name to its index.
    fn resolve(&mut self, iface: &str) -> Result<u32, AgentError>;

    /// Loads the compiled routine image into the host.
    fn load(&mut self) -> Result<Self::Image, AgentError>;

    /// Locates the counting program and the counter map by name within the
    /// loaded image.
    fn bind(&mut self, image: &mut Self::Image) -> Result<(), AgentError>;

    /// Installs the counting program on the interface's ingress path,
    /// replacing any program already installed there.
    fn attach(&mut self, image: &mut Self::Image, ifindex: u32) -> Result<Self::Link, AgentError>;

    /// Reads the current packet count from the bound counter map.
    fn read_count(&mut self, image: &Self::Image) -> Result<u64, AgentError>;

    /// Removes the attachment. Consumes the link so detach happens at most
    /// once per attach.
    fn detach(&mut self, image: &mut Self::Image, link: Self::Link) -> Result<(), AgentError>;

    /// Releases the loaded image and all associated kernel resources.
    fn release(&mut self, image: Self::Image);
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub iface: String,
    pub poll_interval: Duration,
    /// Failed counter reads tolerated per tick before the loop hard-stops.
    pub read_retries: u32,
    /// Delay before the first read retry; doubles on each further attempt.
    pub retry_backoff: Duration,
}

/// Drives the full lifecycle: resolve, load, bind, attach, poll until the
/// shutdown future completes or a read becomes fatal, then detach and release.
///
/// Resolve failures return before anything is loaded. Once `load` succeeds
/// the image is released on every path out of this function, and detach runs
/// whenever attach succeeded, strictly before release.
pub async fn run<H: CounterHost>(
    host: &mut H,
    cfg: &AgentConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AgentError> {
    let ifindex = host.resolve(&cfg.iface)?;
    info!("resolved interface {} to index {ifindex}", cfg.iface);

    let mut image = host.load()?;
    let outcome = run_loaded(host, &mut image, ifindex, cfg, shutdown).await;
    host.release(image);
    outcome
}

async fn run_loaded<H: CounterHost>(
    host: &mut H,
    image: &mut H::Image,
    ifindex: u32,
    cfg: &AgentConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AgentError> {
    host.bind(image)?;

    let link = host.attach(image, ifindex)?;
    println!("attached packet counter to {}", cfg.iface);

    let outcome = poll_counter(host, image, cfg, shutdown).await;

    // Best-effort: a detach failure is reported but never changes the outcome.
    match host.detach(image, link) {
        Ok(()) => println!("detached packet counter from {}", cfg.iface),
        Err(err) => warn!("detach from {} failed: {err}", cfg.iface),
    }

    outcome
}

async fn poll_counter<H: CounterHost>(
    host: &mut H,
    image: &H::Image,
    cfg: &AgentConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AgentError> {
    let mut ticker = time::interval(cfg.poll_interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let count = read_with_retry(host, image, cfg).await?;
                println!("packet count: {count}");
            }
            _ = &mut shutdown => return Ok(()),
        }
    }
}

async fn read_with_retry<H: CounterHost>(
    host: &mut H,
    image: &H::Image,
    cfg: &AgentConfig,
) -> Result<u64, AgentError> {
    let mut backoff = cfg.retry_backoff;
    let mut attempts = 0;
    loop {
        match host.read_count(image) {
            Ok(count) => return Ok(count),
            Err(err) if attempts < cfg.read_retries => {
                attempts += 1;
                warn!(
                    "counter read failed (retry {attempts}/{}): {err}",
                    cfg.read_retries
                );
                time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(err) => return Err(err),
        }
    }
}
