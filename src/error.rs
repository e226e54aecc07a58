use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("envelope exceeds {0} bytes")]
    Oversized(usize),

    #[error("could not read membership file {}: {source}", .path.display())]
    Membership {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}
