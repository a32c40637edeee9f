use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
    },

    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unreadable upstream response: {0}")]
    Decode(String),

    #[error("Upstream timed out after {0} seconds")]
    Timeout(u64),

    #[error("Upstream stream ended before the completion terminator")]
    StreamInterrupted,

    #[error("Server error: {0}")]
    Serve(String),
}

impl RelayError {
    /// Upstream status carried by this error, if it came from a non-success response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::Upstream { status, .. } => Some(*status),
            RelayError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Serve(err.to_string())
    }
}
