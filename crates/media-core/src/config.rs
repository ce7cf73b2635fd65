//! Bridge configuration.
//!
//! The host application resolves configuration (CLI, environment, provider
//! profiles) and hands the bridge a plain struct. Timeout values are
//! empirically chosen defaults, kept configurable because they may need
//! tuning per deployment network.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one [`crate::AudioBridge`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioBridgeConfig {
    /// Local address to bind the RTP socket to
    pub local_host: String,
    /// Local RTP port; 0 lets the OS assign an ephemeral port
    pub local_port: u16,
    /// Call recording settings
    pub recording: RecordingConfig,
    /// Milliseconds of inbound RTP silence (after audio has flowed) before
    /// an `RtpTimeout` event fires; the primary silent-hangup signal
    pub rtp_inactivity_timeout_ms: u64,
    /// Ceiling on how long a response may sit with incomplete packet
    /// accounting before its completion callback is force-fired
    pub completion_safety_deadline_ms: u64,
    /// Grace period after a response finishes generating before deciding it
    /// produced no audio at all
    pub no_audio_grace_ms: u64,
    /// Packets to pre-buffer before streaming starts (10 ms each)
    pub initial_buffer_packets: usize,
}

impl Default for AudioBridgeConfig {
    fn default() -> Self {
        Self {
            local_host: "0.0.0.0".to_string(),
            local_port: 0,
            recording: RecordingConfig::default(),
            rtp_inactivity_timeout_ms: 2_000,
            completion_safety_deadline_ms: 10_000,
            no_audio_grace_ms: 500,
            initial_buffer_packets: 30,
        }
    }
}

impl AudioBridgeConfig {
    /// RTP inactivity timeout as a [`Duration`].
    pub fn rtp_inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.rtp_inactivity_timeout_ms)
    }

    /// Completion safety deadline as a [`Duration`].
    pub fn completion_safety_deadline(&self) -> Duration {
        Duration::from_millis(self.completion_safety_deadline_ms)
    }

    /// No-audio grace period as a [`Duration`].
    pub fn no_audio_grace(&self) -> Duration {
        Duration::from_millis(self.no_audio_grace_ms)
    }
}

/// Call recording settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Whether to record the call
    pub enabled: bool,
    /// Output file path; required when `enabled` is set
    pub path: Option<PathBuf>,
}

impl RecordingConfig {
    /// Enable recording to the given path.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: Some(path.into()),
        }
    }
}
