//! RTP packet header framing and parsing (RFC 3550).

use crate::error::{Result, RtpError};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};
use bytes::{BufMut, Bytes, BytesMut};

/// Length of the fixed RTP header in bytes.
pub const RTP_HEADER_LEN: usize = 12;

/// The only RTP version this bridge speaks.
pub const RTP_VERSION: u8 = 2;

/// Fixed RTP header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version, must be 2
    pub version: u8,
    /// Padding flag
    pub padding: bool,
    /// Header extension flag
    pub extension: bool,
    /// Number of CSRC entries following the fixed header
    pub csrc_count: u8,
    /// Marker bit; set on the first packet of a talkspurt
    pub marker: bool,
    /// Payload type (7 bits)
    pub payload_type: u8,
    /// Sequence number, increments per packet
    pub sequence_number: RtpSequenceNumber,
    /// Media timestamp in RTP clock-rate units
    pub timestamp: RtpTimestamp,
    /// Synchronization source, fixed per stream
    pub ssrc: RtpSsrc,
}

impl RtpHeader {
    /// Create a header with no padding, extension or CSRC entries.
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
        }
    }

    /// Set the marker bit.
    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    /// Serialize the fixed 12-byte header.
    pub fn serialize(&self) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | (self.csrc_count & 0x0F);
        header[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        header[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Parse the fixed header. Rejects short packets and versions other
    /// than 2; tolerates padding, extensions and CSRC entries.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_LEN {
            return Err(RtpError::PacketTooShort { len: data.len() });
        }

        let version = (data[0] >> 6) & 0x03;
        if version != RTP_VERSION {
            return Err(RtpError::UnsupportedVersion { version });
        }

        Ok(Self {
            version,
            padding: (data[0] >> 5) & 0x01 == 1,
            extension: (data[0] >> 4) & 0x01 == 1,
            csrc_count: data[0] & 0x0F,
            marker: (data[1] >> 7) & 0x01 == 1,
            payload_type: data[1] & 0x7F,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }

    /// Byte offset of the payload, accounting for CSRC entries and any
    /// header extension.
    pub fn payload_offset(&self, data: &[u8]) -> Result<usize> {
        let mut offset = RTP_HEADER_LEN + self.csrc_count as usize * 4;

        if self.extension {
            if data.len() < offset + 4 {
                return Err(RtpError::Truncated {
                    offset: offset + 4,
                    len: data.len(),
                });
            }
            let ext_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + ext_words * 4;
        }

        if offset > data.len() {
            return Err(RtpError::Truncated {
                offset,
                len: data.len(),
            });
        }
        Ok(offset)
    }
}

/// A parsed or to-be-sent RTP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Header fields
    pub header: RtpHeader,
    /// Payload bytes (codec frame)
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a packet from header and payload.
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Serialize header and payload into one buffer.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_LEN + self.payload.len());
        buf.put_slice(&self.header.serialize());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a datagram into header and payload, trimming any padding.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = RtpHeader::parse(data)?;
        let offset = header.payload_offset(data)?;

        let mut end = data.len();
        if header.padding && end > offset {
            let pad = data[end - 1] as usize;
            end = end.saturating_sub(pad).max(offset);
        }

        Ok(Self {
            payload: Bytes::copy_from_slice(&data[offset..end]),
            header,
        })
    }
}
