//! DataLink client errors.

#[derive(Debug, thiserror::Error)]
pub enum DataLinkError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("command header of {0} bytes exceeds the 255-byte frame limit")]
    HeaderTooLong(usize),

    #[error("bad frame: {0}")]
    BadFrame(&'static str),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("server error ({token}): {body}")]
    Server { token: String, body: String },

    #[error("connection does not allow writes (no WRITE capability)")]
    NotWritable,

    #[error("record has {got} bytes, negotiated packet size is {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("command deadline expired")]
    Timeout,
}
