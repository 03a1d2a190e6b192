/// Errors produced while driving the counter lifecycle.
///
/// Everything from resolve through attach is fatal: those failures mean the
/// environment is misconfigured, not that a retry would help. A read failure
/// becomes fatal once the configured retry budget is spent. Detach failures
/// are reported by the caller but never escalate on their own.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The configured interface name does not exist on this host.
    #[error("interface not found: {iface}")]
    InterfaceNotFound { iface: String },

    /// The eBPF image could not be loaded or was rejected by the verifier.
    #[error("failed to load ebpf image: {0}")]
    Load(String),

    /// The program or the counter map was missing from the loaded image.
    #[error("failed to bind ebpf object: {0}")]
    Bind(String),

    /// The XDP program could not be installed on the interface.
    #[error("failed to attach xdp program: {0}")]
    Attach(String),

    /// A counter read failed.
    #[error("failed to read packet count: {0}")]
    Read(String),

    /// Best-effort detach failed during shutdown.
    #[error("failed to detach xdp program: {0}")]
    Detach(String),
}
