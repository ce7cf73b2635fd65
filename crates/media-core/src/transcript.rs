//! Transcript/audio correlation for barge-in truncation.
//!
//! Text deltas arrive in generation order, faster than real time; audio is
//! metered out in real time by the pacer. When the caller interrupts, only
//! the text corresponding to audio that actually played may enter the
//! conversation record. The correlation key is `text_index_at_arrival`: the
//! last text delta index known at the moment each audio chunk was produced.
//! Finding the audio segment covering the played duration and cutting the
//! text at that segment's index reconciles the two timelines.

use crate::types::ResponseId;
use std::collections::HashMap;

/// Characters the proportional fallback snaps back to.
const SNAP_BOUNDARY: [char; 5] = ['.', '!', '?', ',', ' '];

/// Maximum distance the boundary snap may move; further than this and the
/// unsnapped cut is used so short truncations are not destroyed.
const SNAP_LIMIT: usize = 20;

/// One audio chunk's bookkeeping.
#[derive(Debug, Clone)]
struct AudioSegment {
    /// Chunk duration in milliseconds
    duration_ms: u64,
    /// Running total through this chunk; segments are append-only and
    /// sorted ascending by this field
    cumulative_end_ms: u64,
    /// Index of the last text delta that had arrived when this chunk was
    /// produced; `None` when audio preceded all text
    text_index_at_arrival: Option<usize>,
}

/// Per-response transcript and audio-duration state.
#[derive(Debug, Default)]
struct ResponseTranscript {
    text_deltas: Vec<String>,
    audio_segments: Vec<AudioSegment>,
    total_audio_ms: u64,
}

impl ResponseTranscript {
    fn full_text(&self) -> String {
        self.text_deltas.concat()
    }
}

/// A transcript split at the interruption point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedTranscript {
    /// Text corresponding to audio that actually played
    pub spoken: String,
    /// Text generated but never voiced. Useful for diagnostics; must never
    /// be logged as part of the conversation transcript.
    pub planned: String,
}

/// Correlates generation-time text deltas with playback-time audio duration,
/// keyed by response id.
#[derive(Debug, Default)]
pub struct TranscriptCorrelator {
    responses: HashMap<ResponseId, ResponseTranscript>,
}

impl TranscriptCorrelator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a response. Idempotent.
    pub fn start_response(&mut self, id: &ResponseId) {
        self.responses.entry(id.clone()).or_default();
    }

    /// Append a text delta in arrival order.
    pub fn on_text_delta(&mut self, id: &ResponseId, text: &str) {
        self.responses
            .entry(id.clone())
            .or_default()
            .text_deltas
            .push(text.to_string());
    }

    /// Record an audio delta's duration. `byte_len` is the PCM16 byte count;
    /// duration is `byte_len / 2 / sample_rate` seconds. Empty deltas are
    /// ignored entirely.
    pub fn on_audio_delta(&mut self, id: &ResponseId, byte_len: usize, sample_rate: u32) {
        if byte_len == 0 {
            return;
        }
        let entry = self.responses.entry(id.clone()).or_default();

        let samples = (byte_len / 2) as u64;
        let duration_ms = samples * 1000 / sample_rate as u64;
        entry.total_audio_ms += duration_ms;
        entry.audio_segments.push(AudioSegment {
            duration_ms,
            cumulative_end_ms: entry.total_audio_ms,
            text_index_at_arrival: entry.text_deltas.len().checked_sub(1),
        });
    }

    /// Whether any audio has been tracked for `id`. Decides whether a
    /// finished response can be logged immediately (text-only) or must wait
    /// for playback completion.
    pub fn has_audio(&self, id: &ResponseId) -> bool {
        self.responses
            .get(id)
            .map(|r| r.total_audio_ms > 0)
            .unwrap_or(false)
    }

    /// Total tracked audio duration for `id` in milliseconds.
    pub fn total_audio_ms(&self, id: &ResponseId) -> u64 {
        self.responses.get(id).map(|r| r.total_audio_ms).unwrap_or(0)
    }

    /// The full transcript accumulated for `id`.
    pub fn full_transcript(&self, id: &ResponseId) -> String {
        self.responses
            .get(id)
            .map(|r| r.full_text())
            .unwrap_or_default()
    }

    /// The transcript truncated to `played_ms` of audio.
    ///
    /// With no audio ever tracked the full transcript is returned — nothing
    /// played, so no correlation is possible. Otherwise the first segment
    /// whose cumulative end reaches `played_ms` bounds the text index. If no
    /// segment matches (played past the end), the proportional fallback
    /// cuts the joined text at the played fraction and snaps back to the
    /// nearest sentence/word boundary within 20 characters.
    pub fn truncate_at(&self, id: &ResponseId, played_ms: u64) -> String {
        let Some(response) = self.responses.get(id) else {
            return String::new();
        };
        if response.total_audio_ms == 0 {
            return response.full_text();
        }

        if let Some(segment) = response
            .audio_segments
            .iter()
            .find(|s| s.cumulative_end_ms >= played_ms)
        {
            return match segment.text_index_at_arrival {
                Some(limit) => response.text_deltas[..=limit].concat(),
                None => String::new(),
            };
        }

        proportional_truncate(&response.full_text(), played_ms, response.total_audio_ms)
    }

    /// Like [`truncate_at`](Self::truncate_at), additionally returning the
    /// never-voiced suffix.
    pub fn truncated_with_planned(&self, id: &ResponseId, played_ms: u64) -> TruncatedTranscript {
        let spoken = self.truncate_at(id, played_ms);
        let full = self.full_transcript(id);
        let planned = full.get(spoken.len()..).unwrap_or_default().to_string();
        TruncatedTranscript { spoken, planned }
    }

    /// Forget a response once its transcript has been logged or superseded.
    pub fn cleanup(&mut self, id: &ResponseId) {
        self.responses.remove(id);
    }

    /// Forget everything (call teardown).
    pub fn clear(&mut self) {
        self.responses.clear();
    }
}

/// Cut `full` at the played fraction of the total duration, snapping
/// backward to a boundary character when one is close enough.
fn proportional_truncate(full: &str, played_ms: u64, total_ms: u64) -> String {
    let fraction = (played_ms as f64 / total_ms as f64).min(1.0);
    let char_count = full.chars().count();
    let cut_chars = (char_count as f64 * fraction).floor() as usize;

    if cut_chars >= char_count {
        return full.to_string();
    }

    // Byte offset of the unsnapped cut point.
    let cut_byte = full
        .char_indices()
        .nth(cut_chars)
        .map(|(i, _)| i)
        .unwrap_or(full.len());

    let prefix = &full[..cut_byte];
    let snapped = prefix
        .char_indices()
        .rev()
        .take(SNAP_LIMIT)
        .find(|(_, c)| SNAP_BOUNDARY.contains(c))
        .map(|(i, c)| i + c.len_utf8());

    match snapped {
        Some(byte) => full[..byte].to_string(),
        None => prefix.to_string(),
    }
}
