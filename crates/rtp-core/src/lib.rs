//! # sipbridge-rtp-core: RTP Framing and Stream Bookkeeping
//!
//! The wire-format half of the bridge's audio path: building and parsing the
//! 12-byte RTP v2 header, and the per-stream sequence/timestamp counters for
//! outbound packets.
//!
//! The bridge owns its outbound sequence space outright — sequence numbers
//! are never derived from inbound traffic. Timestamps advance at the codec's
//! RTP *clock rate*, which for G.722 is not its sample rate (RFC 3551).

pub mod error;
pub mod packet;
pub mod stream;

pub use error::{Result, RtpError};
pub use packet::{RtpHeader, RtpPacket, RTP_HEADER_LEN, RTP_VERSION};
pub use stream::RtpStreamState;

/// RTP sequence number (16 bits, wraps).
pub type RtpSequenceNumber = u16;

/// RTP timestamp (32 bits, wraps).
pub type RtpTimestamp = u32;

/// RTP synchronization source identifier.
pub type RtpSsrc = u32;
