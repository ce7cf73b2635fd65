//! Event types crossing the bridge's external boundaries.
//!
//! One closed enum per event family. Each variant carries exactly the fields
//! that event needs; the bridge never sees the collaborators' wire formats.

use crate::error::{MediaError, Result};
use crate::types::ResponseId;
use bytes::Bytes;

/// Events consumed from the SIP signaling collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SipEvent {
    /// The call was answered and media parameters are negotiated.
    CallAnswered {
        /// Negotiated RTP payload type
        payload_type: u8,
        /// Remote RTP host
        remote_host: String,
        /// Remote RTP port
        remote_port: u16,
    },
    /// The call ended (BYE or transport failure).
    CallEnded,
}

/// Events consumed from the AI speech collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiEvent {
    /// A new response (utterance) started generating.
    ResponseCreated {
        /// Identifier for the new response
        response_id: ResponseId,
    },
    /// A chunk of generated audio: 16-bit little-endian PCM at 24 kHz.
    AudioDelta {
        /// Response this audio belongs to
        response_id: ResponseId,
        /// Raw PCM16-LE bytes
        audio: Bytes,
    },
    /// A chunk of generated transcript text.
    TextDelta {
        /// Response this text belongs to
        response_id: ResponseId,
        /// Text fragment, in generation order
        text: String,
    },
    /// The response finished generating (text and audio complete).
    ResponseDone {
        /// Identifier of the finished response
        response_id: ResponseId,
    },
    /// The caller started speaking while AI audio may still be playing.
    UserSpeechStarted,
    /// The AI asked to end the call once the given response finishes playing.
    EndCallRequested {
        /// Response to wait for before hanging up
        response_id: ResponseId,
        /// Reason to report upstream
        reason: String,
    },
}

impl AiEvent {
    /// Build an [`AiEvent::AudioDelta`] from the base64 payload the realtime
    /// API delivers. The decoded bytes must be whole 16-bit samples.
    pub fn audio_delta_from_base64(response_id: ResponseId, encoded: &str) -> Result<Self> {
        let audio = base64::decode(encoded)
            .map_err(|e| MediaError::invalid_audio(format!("base64 decode failed: {e}")))?;
        if audio.len() % 2 != 0 {
            return Err(MediaError::invalid_audio(format!(
                "odd PCM16 byte length: {}",
                audio.len()
            )));
        }
        Ok(Self::AudioDelta {
            response_id,
            audio: Bytes::from(audio),
        })
    }
}

/// Events emitted by the bridge toward its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Caller audio, decoded and resampled to 24 kHz, ready for the AI
    /// collaborator.
    AudioReceived {
        /// PCM samples at 24 kHz
        pcm: Vec<i16>,
    },
    /// Inbound RTP went silent after audio had flowed; the caller likely
    /// hung up without a BYE.
    RtpTimeout,
    /// Every queued packet of the response has been transmitted.
    ResponseComplete {
        /// Identifier of the fully played response
        response_id: ResponseId,
    },
    /// The caller interrupted playback; carries what was audibly spoken.
    ResponseInterrupted {
        /// Identifier of the interrupted response
        response_id: ResponseId,
        /// How much of it had actually played
        played_ms: u64,
        /// Transcript truncated to the played duration
        spoken: String,
        /// Text generated but never voiced; diagnostics only, never part of
        /// the conversation transcript
        planned: String,
    },
    /// A requested hangup is now safe to execute: the closing response has
    /// finished playing.
    CallEndReady {
        /// Reason passed through from the AI collaborator
        reason: String,
    },
}

/// Decode PCM16-LE bytes into samples.
pub fn pcm_from_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as PCM16-LE bytes.
pub fn pcm_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}
