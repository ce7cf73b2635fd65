//! Error handling for the media core.

use thiserror::Error;

/// Result type alias for media operations
pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors surfaced by the audio bridge and its components.
///
/// Per-packet and per-tick failures are contained and logged where they
/// occur; only call-setup failures (socket bind, missing codec) reach the
/// caller through this type.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Operation requires an active bridge
    #[error("audio bridge is not active")]
    NotActive,

    /// Operation requires a negotiated codec
    #[error("no codec negotiated")]
    NoCodecNegotiated,

    /// The requested payload type has no usable codec
    #[error("unsupported payload type: {payload_type}")]
    UnsupportedPayloadType {
        /// The RTP payload type that was requested
        payload_type: u8,
    },

    /// Codec-level failure
    #[error(transparent)]
    Codec(#[from] sipbridge_codec_core::CodecError),

    /// RTP-level failure
    #[error(transparent)]
    Rtp(#[from] sipbridge_rtp_core::RtpError),

    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Recording stream failure
    #[error("recording error: {reason}")]
    Recording {
        /// Human-readable failure detail
        reason: String,
    },

    /// Malformed audio payload from the AI collaborator
    #[error("invalid audio payload: {details}")]
    InvalidAudio {
        /// Human-readable failure detail
        details: String,
    },

    /// Remote endpoint could not be parsed
    #[error("invalid remote endpoint: {details}")]
    InvalidEndpoint {
        /// Human-readable failure detail
        details: String,
    },
}

impl MediaError {
    /// Create a recording error
    pub fn recording(reason: impl Into<String>) -> Self {
        Self::Recording {
            reason: reason.into(),
        }
    }

    /// Create an invalid-audio error
    pub fn invalid_audio(details: impl Into<String>) -> Self {
        Self::InvalidAudio {
            details: details.into(),
        }
    }
}
