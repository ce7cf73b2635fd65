//! Error handling for RTP packet processing.

use thiserror::Error;

/// Result type alias for RTP operations
pub type Result<T> = std::result::Result<T, RtpError>;

/// Errors produced while parsing RTP packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtpError {
    /// Packet is shorter than the fixed RTP header
    #[error("packet too short for RTP header: {len} bytes")]
    PacketTooShort {
        /// Observed packet length
        len: usize,
    },

    /// Version field is not 2
    #[error("unsupported RTP version: {version}")]
    UnsupportedVersion {
        /// Observed version bits
        version: u8,
    },

    /// Header extensions or CSRC list extend past the end of the packet
    #[error("truncated RTP packet: payload offset {offset} beyond {len} bytes")]
    Truncated {
        /// Computed payload offset
        offset: usize,
        /// Observed packet length
        len: usize,
    },
}
