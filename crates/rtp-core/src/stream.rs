//! Outbound RTP stream bookkeeping.

use crate::packet::{RtpHeader, RtpPacket};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};
use bytes::Bytes;
use rand::Rng;

/// Sequence and timestamp counters for one outbound RTP stream.
///
/// The counters are owned by the bridge and advance once per framed packet;
/// both wrap with plain unsigned arithmetic. The timestamp increment is
/// expressed in RTP clock-rate units, so a G.722 stream configured for
/// 160 samples per packet advances by 80.
#[derive(Debug)]
pub struct RtpStreamState {
    payload_type: u8,
    ssrc: RtpSsrc,
    sequence: RtpSequenceNumber,
    timestamp: RtpTimestamp,
    timestamp_increment: RtpTimestamp,
}

impl RtpStreamState {
    /// Create stream state with a random SSRC and random initial sequence
    /// number and timestamp, per RFC 3550.
    pub fn new(payload_type: u8) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            payload_type,
            ssrc: rng.gen(),
            sequence: rng.gen(),
            timestamp: rng.gen(),
            timestamp_increment: 0,
        }
    }

    /// Create stream state with explicit initial values (tests, replay).
    pub fn with_initial(
        payload_type: u8,
        ssrc: RtpSsrc,
        sequence: RtpSequenceNumber,
        timestamp: RtpTimestamp,
    ) -> Self {
        Self {
            payload_type,
            ssrc,
            sequence,
            timestamp,
            timestamp_increment: 0,
        }
    }

    /// Configure the per-packet timestamp increment from the codec's
    /// geometry. `samples_per_packet` is in audio samples; the increment is
    /// scaled to clock-rate units.
    pub fn set_cadence(&mut self, samples_per_packet: u32, sample_rate: u32, clock_rate: u32) {
        self.timestamp_increment = samples_per_packet * clock_rate / sample_rate;
    }

    /// Frame a payload into an RTP packet, consuming one sequence number and
    /// one timestamp step.
    pub fn next_packet(&mut self, payload: Bytes, marker: bool) -> RtpPacket {
        let header = RtpHeader::new(self.payload_type, self.sequence, self.timestamp, self.ssrc)
            .with_marker(marker);
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.timestamp_increment);
        RtpPacket::new(header, payload)
    }

    /// The stream's SSRC.
    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    /// The next sequence number to be used.
    pub fn sequence(&self) -> RtpSequenceNumber {
        self.sequence
    }

    /// The next timestamp to be used.
    pub fn timestamp(&self) -> RtpTimestamp {
        self.timestamp
    }

    /// The negotiated payload type.
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_timestamp_advance() {
        let mut stream = RtpStreamState::with_initial(8, 0x1234, 100, 1000);
        stream.set_cadence(80, 8000, 8000);

        let p1 = stream.next_packet(Bytes::from_static(&[0; 80]), true);
        let p2 = stream.next_packet(Bytes::from_static(&[0; 80]), false);
        let p3 = stream.next_packet(Bytes::from_static(&[0; 80]), false);

        assert_eq!(p1.header.sequence_number, 100);
        assert_eq!(p2.header.sequence_number, 101);
        assert_eq!(p3.header.sequence_number, 102);
        assert_eq!(p1.header.timestamp, 1000);
        assert_eq!(p2.header.timestamp, 1080);
        assert_eq!(p3.header.timestamp, 1160);
        assert!(p1.header.marker);
        assert!(!p2.header.marker);
    }

    #[test]
    fn test_g722_clock_rate_scaling() {
        // G.722: 160 samples per 10ms packet at 16kHz, but the RTP clock
        // runs at 8000, so timestamps advance by 80.
        let mut stream = RtpStreamState::with_initial(9, 1, 0, 0);
        stream.set_cadence(160, 16000, 8000);

        let mut last = None;
        for _ in 0..8 {
            let p = stream.next_packet(Bytes::from_static(&[0; 80]), false);
            if let Some(prev) = last {
                assert_eq!(p.header.timestamp, prev + 80);
            }
            last = Some(p.header.timestamp);
        }
    }

    #[test]
    fn test_sequence_wraps_at_u16() {
        let mut stream = RtpStreamState::with_initial(0, 1, 65535, 0);
        stream.set_cadence(80, 8000, 8000);
        let p1 = stream.next_packet(Bytes::new(), false);
        let p2 = stream.next_packet(Bytes::new(), false);
        assert_eq!(p1.header.sequence_number, 65535);
        assert_eq!(p2.header.sequence_number, 0);
    }

    #[test]
    fn test_timestamp_wraps_at_u32() {
        let mut stream = RtpStreamState::with_initial(0, 1, 0, u32::MAX - 40);
        stream.set_cadence(80, 8000, 8000);
        let p1 = stream.next_packet(Bytes::new(), false);
        let p2 = stream.next_packet(Bytes::new(), false);
        assert_eq!(p1.header.timestamp, u32::MAX - 40);
        assert_eq!(p2.header.timestamp, 39); // wrapped past 2^32
    }

    #[test]
    fn test_random_ssrc_differs() {
        let a = RtpStreamState::new(0);
        let b = RtpStreamState::new(0);
        // Not a guarantee, but a 1-in-2^32 flake is acceptable.
        assert_ne!((a.ssrc(), a.sequence()), (b.ssrc(), b.sequence()));
    }
}
