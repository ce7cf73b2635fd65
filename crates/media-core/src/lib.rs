//! # sipbridge-media-core: Real-Time Audio Bridging
//!
//! The engine that sits between a telephone call's RTP leg and a realtime AI
//! speech service speaking 24 kHz PCM. It paces outbound audio onto the
//! network at exact wall-clock intervals, transcodes between the telephony
//! codec domain (8/16 kHz G.711/G.722) and the AI's fixed 24 kHz domain, and
//! keeps per-utterance accounting precise enough that a barge-in can be
//! truncated to exactly what the caller actually heard.
//!
//! ## Components
//!
//! - [`resample`]: fixed-ratio linear-interpolation sample-rate conversion
//! - [`chunk_queue`]: zero-padding PCM FIFOs that glue timelines to the clock
//! - [`scheduler`]: the jitter-buffered 10 ms packet pacer
//! - [`response_tracker`]: per-utterance queued/sent packet accounting
//! - [`transcript`]: text-delta ↔ audio-duration correlation for truncation
//! - [`recorder`]: the independent 20 ms stereo call recorder
//! - [`bridge`]: the orchestrator owning the UDP endpoint and wiring it all
//!
//! Three periodic activities run per call: socket-driven inbound handling,
//! the 10 ms RTP pacer, and the 20 ms recorder tick. The two timers are
//! deliberately separate loops — inbound and outbound audio are asynchronous
//! relative to each other and share nothing but the queues.

pub mod bridge;
pub mod chunk_queue;
pub mod config;
pub mod error;
pub mod events;
pub mod recorder;
pub mod resample;
pub mod response_tracker;
pub mod scheduler;
pub mod transcript;
pub mod types;

pub use bridge::AudioBridge;
pub use chunk_queue::ChunkQueue;
pub use config::{AudioBridgeConfig, RecordingConfig};
pub use error::{MediaError, Result};
pub use events::{AiEvent, BridgeEvent, SipEvent};
pub use response_tracker::ResponseAudioTracker;
pub use scheduler::{JitterScheduler, SchedulerState};
pub use transcript::TranscriptCorrelator;
pub use types::ResponseId;

/// Sample rate of the AI service's PCM domain, fixed by its API.
pub const AI_SAMPLE_RATE: u32 = 24_000;
