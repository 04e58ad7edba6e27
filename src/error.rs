//! Error types for the transport kernel and its drivers.

use thiserror::Error;

/// Unified error type for transport operations.
///
/// Every packet-level variant names the packet and the shell it was in, so a
/// fatal abort can be traced back to the offending history.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Geometry or opacity tables violate their construction invariants
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// The caller handed the kernel a packet it must not trace
    #[error("packet {packet} in shell {shell}: {reason}")]
    Precondition {
        packet: u64,
        shell: usize,
        reason: String,
    },

    /// A distance or optical depth came out NaN or negative
    #[error("packet {packet} in shell {shell}: {quantity} = {value:e} at line {line}")]
    Numerical {
        packet: u64,
        shell: usize,
        line: usize,
        quantity: &'static str,
        value: f64,
    },

    /// Configuration validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors (model snapshots, estimator dumps)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Creates a model validation error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        TransportError::InvalidModel(message.into())
    }

    /// Creates a precondition violation for a packet.
    pub fn precondition(packet: u64, shell: usize, reason: impl Into<String>) -> Self {
        TransportError::Precondition {
            packet,
            shell,
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TransportError::Config(message.into())
    }

    /// Whether the error concerns a single packet rather than the whole run
    pub fn is_packet_error(&self) -> bool {
        matches!(
            self,
            TransportError::Precondition { .. } | TransportError::Numerical { .. }
        )
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
