//! Gateway error taxonomy.

use thiserror::Error;
use vidmesh_protocol::error::ProtocolError;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The referenced file or artifact is absent. Raised before any RPC.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Disallowed format, malformed file name or query. Raised before any RPC.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A worker call could not be completed.
    #[error("{worker} failed: {message}")]
    UpstreamUnavailable {
        worker: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl GatewayError {
    /// True for errors the caller caused (the 4xx family).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound(_) | GatewayError::InvalidArgument(_)
        )
    }
}

impl From<ProtocolError> for GatewayError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidFileRef { .. } | ProtocolError::UnsupportedFormat(_) => {
                GatewayError::InvalidArgument(err.to_string())
            }
            ProtocolError::IoError(e) => GatewayError::Storage(e),
            other => GatewayError::UpstreamUnavailable {
                worker: "protocol",
                message: other.to_string(),
            },
        }
    }
}
