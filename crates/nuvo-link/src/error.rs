//! Error types for the amplifier link

use nuvo_protocol::ArgumentError;
use thiserror::Error;

/// Errors that can occur while talking to the amplifier
#[derive(Debug, Error)]
pub enum LinkError {
    /// Caller-supplied value rejected before any I/O
    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    /// Failed to open the serial port
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Read, write or flush failed on the underlying connection
    #[error("I/O error: {0}")]
    Transport(#[from] std::io::Error),

    /// The connection reported end of stream
    #[error("link closed by peer")]
    Closed,

    /// No complete line arrived before the response deadline
    #[error("no response within {ms}ms")]
    Timeout { ms: u64 },

    /// Amplifier answered `#Busy`
    #[error("amplifier busy")]
    Busy,

    /// A line arrived but carried no usable zone status
    #[error("unrecognized response: {line:?}")]
    Mismatch { line: String },
}

impl LinkError {
    /// Whether a status query should be retried after this error
    ///
    /// Only timeouts, busy replies and unusable lines qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Timeout { .. } | LinkError::Busy | LinkError::Mismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LinkError::Timeout { ms: 2500 }.is_retryable());
        assert!(LinkError::Busy.is_retryable());
        assert!(LinkError::Mismatch {
            line: "junk".into()
        }
        .is_retryable());

        assert!(!LinkError::Closed.is_retryable());
        assert!(!LinkError::Transport(std::io::ErrorKind::BrokenPipe.into()).is_retryable());
        assert!(!LinkError::Argument(ArgumentError::ZoneOutOfRange { zone: 0, max: 20 })
            .is_retryable());
    }
}
