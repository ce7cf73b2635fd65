//! # sipbridge-codec-core: Telephony Audio Codecs
//!
//! Codec implementations and payload-type bookkeeping for the sipbridge
//! audio path. The media core orchestrates codecs exclusively through the
//! [`AudioCodec`] trait; nothing outside this crate depends on a concrete
//! codec type.
//!
//! ## Codecs
//!
//! - **G.711 (PCMU/PCMA)**: ITU-T compliant μ-law and A-law, always available
//! - **G.722**: Wideband sub-band ADPCM, behind the `g722` feature
//!   (enabled by default)
//!
//! G.722 carries an RTP quirk worth calling out once: it samples at 16 kHz
//! but its RTP clock rate is 8000 per RFC 3551. Timestamp arithmetic must use
//! [`CodecInfo::clock_rate`], never [`CodecInfo::sample_rate`].
//!
//! ## Usage
//!
//! ```rust
//! use sipbridge_codec_core::CodecRegistry;
//!
//! let registry = CodecRegistry::with_defaults();
//! let mut codec = registry.create(8).expect("PCMA is always registered");
//!
//! let samples = vec![0i16; 80]; // 10ms at 8kHz
//! let encoded = codec.encode(&samples)?;
//! let decoded = codec.decode(&encoded)?;
//! # Ok::<(), sipbridge_codec_core::CodecError>(())
//! ```

pub mod codecs;
pub mod error;
pub mod registry;
pub mod types;

pub use error::{CodecError, Result};
pub use registry::CodecRegistry;
pub use types::{AudioCodec, CodecInfo, CodecType};

/// Duration of one RTP packet in milliseconds, fixed across the bridge.
pub const PACKET_DURATION_MS: u32 = 10;
