/// Error types for the probing engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Cannot resolve hostname '{host}'")]
    Resolution { host: String },

    #[error("No IPv4 address found for '{host}'")]
    NoIpv4 { host: String },

    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("{0}")]
    Permission(String),

    #[error("Probe worker panicked: {0}")]
    WorkerPanicked(String),
}

impl TraceError {
    /// True for failures reported before any probing started
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::NoIpv4 { .. })
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
