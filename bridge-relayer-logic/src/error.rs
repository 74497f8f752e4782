use thiserror::Error;

/// Taxonomy of failures raised by the relayer core. Each variant corresponds to
/// one of the failure classes handled by its own caller (Supervisor, EventIngestor,
/// Relayer, Signer) rather than bubbling up as an opaque `anyhow::Error`.
#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("missing configuration: {0}")]
    Config(String),

    #[error("transport connection failed: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("chain RPC returned an error: {0}")]
    Chain(#[source] anyhow::Error),

    #[error("transaction submission rejected: {0}")]
    Tx(String),

    #[error("recovered signer address does not match configured signer")]
    SignatureMismatch,

    #[error("event carries no recognizable transaction hash")]
    MissingHash,
}

impl RelayerError {
    /// `true` for submission errors the source chain considers benign resubmissions.
    ///
    /// Mirrors the `"already known"` substring check used by geth-family clients
    /// when two attempts race to submit the same relay.
    pub fn is_already_known(&self) -> bool {
        matches!(self, RelayerError::Tx(msg) if msg.to_lowercase().contains("already known"))
    }
}

pub type Result<T> = std::result::Result<T, RelayerError>;
