//! Core types and traits shared by all codecs.

use crate::error::Result;
use std::fmt;

/// Capability contract every telephony codec exposes to the media core.
///
/// Implementations may keep internal state between calls (G.722's ADPCM
/// predictors do); `reset` returns a codec to its initial state for stream
/// discontinuities.
pub trait AudioCodec: Send {
    /// Static description of the codec: name, payload type, rates.
    fn info(&self) -> CodecInfo;

    /// Encode 16-bit linear PCM at the codec's native rate into payload bytes.
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>>;

    /// Decode payload bytes into 16-bit linear PCM at the codec's native rate.
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>>;

    /// Clear all internal state.
    fn reset(&mut self);
}

/// Static codec description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    /// Codec name as it appears in SDP (e.g. "PCMU", "G722")
    pub name: &'static str,
    /// RTP payload type (RFC 3551 static assignment)
    pub payload_type: u8,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// RTP clock rate in Hz. Differs from `sample_rate` for G.722
    /// (16000/8000) per RFC 3551.
    pub clock_rate: u32,
}

impl CodecInfo {
    /// Samples per RTP packet at the given packet duration.
    pub fn samples_per_packet(&self, packet_ms: u32) -> usize {
        (self.sample_rate * packet_ms / 1000) as usize
    }

    /// RTP timestamp increment per packet: samples scaled from the audio
    /// sample rate to the RTP clock rate.
    pub fn timestamp_increment(&self, packet_ms: u32) -> u32 {
        self.samples_per_packet(packet_ms) as u32 * self.clock_rate / self.sample_rate
    }
}

/// The codec types this bridge can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// G.711 μ-law (PCMU, payload type 0)
    Pcmu,
    /// G.711 A-law (PCMA, payload type 8)
    Pcma,
    /// G.722 wideband (payload type 9)
    G722,
}

impl CodecType {
    /// Codec name as used in SDP.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pcmu => "PCMU",
            Self::Pcma => "PCMA",
            Self::G722 => "G722",
        }
    }

    /// Static RTP payload type.
    pub fn payload_type(self) -> u8 {
        match self {
            Self::Pcmu => 0,
            Self::Pcma => 8,
            Self::G722 => 9,
        }
    }

    /// Audio sample rate in Hz.
    pub fn sample_rate(self) -> u32 {
        match self {
            Self::Pcmu | Self::Pcma => 8000,
            Self::G722 => 16000,
        }
    }

    /// RTP clock rate in Hz.
    pub fn clock_rate(self) -> u32 {
        8000
    }

    /// Resolve a static payload type to a codec type.
    pub fn from_payload_type(payload_type: u8) -> Option<Self> {
        match payload_type {
            0 => Some(Self::Pcmu),
            8 => Some(Self::Pcma),
            9 => Some(Self::G722),
            _ => None,
        }
    }

    /// Static description for this codec type.
    pub fn info(self) -> CodecInfo {
        CodecInfo {
            name: self.name(),
            payload_type: self.payload_type(),
            sample_rate: self.sample_rate(),
            clock_rate: self.clock_rate(),
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_type_properties() {
        assert_eq!(CodecType::Pcmu.name(), "PCMU");
        assert_eq!(CodecType::Pcmu.payload_type(), 0);
        assert_eq!(CodecType::Pcma.payload_type(), 8);
        assert_eq!(CodecType::G722.payload_type(), 9);
        assert_eq!(CodecType::from_payload_type(8), Some(CodecType::Pcma));
        assert_eq!(CodecType::from_payload_type(42), None);
    }

    #[test]
    fn test_g722_clock_rate_differs_from_sample_rate() {
        let info = CodecType::G722.info();
        assert_eq!(info.sample_rate, 16000);
        assert_eq!(info.clock_rate, 8000);
        // 10ms of 16kHz audio is 160 samples, but the RTP timestamp only
        // advances by 80 because the clock runs at 8000.
        assert_eq!(info.samples_per_packet(10), 160);
        assert_eq!(info.timestamp_increment(10), 80);
    }

    #[test]
    fn test_g711_timestamp_increment() {
        let info = CodecType::Pcma.info();
        assert_eq!(info.samples_per_packet(10), 80);
        assert_eq!(info.timestamp_increment(10), 80);
    }
}
