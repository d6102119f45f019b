//! SeedLink client errors.

/// Everything the client surfaces to callers.
///
/// `Timeout` is the per-read deadline and is handled inside the collection
/// loop (keep-alive or reconnect); `NetTimeout` and `Cancelled` are the
/// loop's terminal outcomes for a stalled server and a caller shutdown.
#[derive(Debug, thiserror::Error)]
pub enum SeedLinkError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad packet: {0}")]
    BadPacket(&'static str),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("server rejected {command}: {reply}")]
    Command { command: String, reply: String },

    #[error("server does not advertise capability {capability}")]
    CapabilityMissing { capability: String },

    #[error("read deadline expired")]
    Timeout,

    #[error("no packets within the network timeout")]
    NetTimeout,

    #[error("collection cancelled")]
    Cancelled,

    #[error("packet handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("state file {path}: {source}")]
    State {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
