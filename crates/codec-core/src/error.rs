//! Error handling for codec operations.

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while creating or running a codec
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload type has no registered codec
    #[error("unsupported payload type: {payload_type}")]
    UnsupportedPayloadType {
        /// The RTP payload type that was requested
        payload_type: u8,
    },

    /// Input frame does not match what the codec expects
    #[error("invalid frame size: expected a multiple of {multiple}, got {actual}")]
    InvalidFrameSize {
        /// Required sample-count granularity
        multiple: usize,
        /// Sample count that was supplied
        actual: usize,
    },

    /// Encoding operation failed
    #[error("encoding failed: {reason}")]
    EncodingFailed {
        /// Human-readable failure detail
        reason: String,
    },

    /// Decoding operation failed
    #[error("decoding failed: {reason}")]
    DecodingFailed {
        /// Human-readable failure detail
        reason: String,
    },

    /// Codec construction failed
    #[error("codec initialization failed: {reason}")]
    InitializationFailed {
        /// Human-readable failure detail
        reason: String,
    },
}

impl CodecError {
    /// Create an unsupported-payload-type error
    pub fn unsupported(payload_type: u8) -> Self {
        Self::UnsupportedPayloadType { payload_type }
    }

    /// Create an encoding-failed error
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::EncodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a decoding-failed error
    pub fn decoding(reason: impl Into<String>) -> Self {
        Self::DecodingFailed {
            reason: reason.into(),
        }
    }
}
