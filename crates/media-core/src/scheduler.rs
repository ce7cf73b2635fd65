//! Jitter-buffered RTP packet scheduler.
//!
//! Pre-encoded packets are queued here and released onto the network by a
//! drift-corrected 10 ms pacing task. The scheduler runs an explicit state
//! machine:
//!
//! - `Idle`: no pacing task, queue empty
//! - `Buffering`: packets accumulating, pacing not yet started
//! - `Streaming`: the pacing task dequeues one packet per tick, synthesizing
//!   a silence packet whenever the queue underruns — receivers rely on
//!   steady packet arrival to keep their own jitter buffers fed, so silence
//!   injection is mandatory
//!
//! Buffering transitions to Streaming once the queue reaches the dynamic
//! pre-buffer threshold (initially 30 packets = 300 ms). The threshold grows
//! when delivery gaps from the AI service are observed, trading latency for
//! resilience, and shrinks again on interruption.
//!
//! The pacing loop advances an absolute deadline by the tick interval and
//! sleeps until that deadline, so scheduler lag never accumulates into
//! drift.

use crate::types::ResponseId;
use bytes::Bytes;
use parking_lot::Mutex;
use sipbridge_rtp_core::RtpStreamState;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

/// Pacing interval: one RTP packet every 10 ms.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Packets transmitted immediately, bypassing pacing, when audio first
/// becomes available after a start or an interruption clear.
const BURST_PACKETS: usize = 5;

/// Delivery gap that counts toward buffer growth.
const GAP_THRESHOLD: Duration = Duration::from_millis(500);

/// Every this many observed gaps, the pre-buffer threshold grows.
const GAPS_PER_GROWTH: u32 = 3;

/// Packets added to the threshold per growth step.
const GROWTH_STEP: usize = 5;

/// Packets removed from the threshold on interruption.
const SHRINK_STEP: usize = 10;

/// Hard ceiling on the pre-buffer threshold (500 ms).
const MAX_BUFFER_PACKETS: usize = 50;

/// One queued outbound packet: the framed wire bytes plus the PCM that
/// produced them, so the recorder can log exactly what left the wire.
#[derive(Debug, Clone)]
pub struct JitterQueueEntry {
    /// Serialized RTP packet ready for the socket
    pub packet: Bytes,
    /// The codec-rate PCM that was encoded into `packet`
    pub source_pcm: Vec<i16>,
}

/// What a transmitted packet carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Real per-response audio
    Audio,
    /// Synthesized silence covering a queue underrun
    Silence,
}

/// Where the scheduler hands packets at transmit time. The implementation
/// (the bridge) performs the UDP send, per-response sent accounting and
/// recorder logging synchronously, in tick order.
pub trait PacketSink: Send + Sync + 'static {
    /// Transmit one packet. Errors are the sink's to log; the pacer never
    /// stops on a failed send.
    fn transmit(&self, entry: &JitterQueueEntry, kind: PacketKind);
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No pacing task, nothing queued
    Idle,
    /// Accumulating packets toward the pre-buffer threshold
    Buffering,
    /// Pacing task live, one packet per tick
    Streaming,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Audio packets handed to the sink
    pub audio_packets: u64,
    /// Silence packets synthesized on underrun
    pub silence_packets: u64,
    /// Packets sent in initial bursts (included in `audio_packets`)
    pub burst_packets: u64,
    /// Delivery gaps observed
    pub gaps_observed: u64,
    /// Current pre-buffer threshold in packets
    pub buffer_threshold: usize,
    /// Current queue depth in packets
    pub queue_depth: usize,
}

/// Template for synthesizing one silence packet in the negotiated codec.
#[derive(Debug, Clone)]
pub struct SilenceTemplate {
    /// Encoded silence payload for one 10 ms frame
    pub payload: Bytes,
    /// The zero PCM it encodes, at the codec's native rate
    pub pcm: Vec<i16>,
}

struct SchedulerInner {
    state: SchedulerState,
    queue: VecDeque<JitterQueueEntry>,
    rtp: Option<RtpStreamState>,
    silence: Option<SilenceTemplate>,
    buffer_threshold: usize,
    min_buffer: usize,
    burst_done: bool,
    marker_pending: bool,
    gap_count: u32,
    last_delivery: Option<Instant>,
    audio_packets: u64,
    silence_packets: u64,
    burst_packets: u64,
    gaps_observed: u64,
}

impl SchedulerInner {
    /// Frame one payload, consuming sequence/timestamp state. Returns `None`
    /// until a stream has been configured.
    fn frame(&mut self, payload: Bytes, pcm: Vec<i16>) -> Option<JitterQueueEntry> {
        let rtp = self.rtp.as_mut()?;
        let marker = std::mem::take(&mut self.marker_pending);
        let packet = rtp.next_packet(payload, marker).serialize();
        Some(JitterQueueEntry {
            packet,
            source_pcm: pcm,
        })
    }

    fn frame_silence(&mut self) -> Option<JitterQueueEntry> {
        let template = self.silence.clone()?;
        self.frame(template.payload, template.pcm)
    }

    fn note_delivery(&mut self, now: Instant) {
        if let Some(last) = self.last_delivery {
            if now.duration_since(last) > GAP_THRESHOLD {
                self.gap_count += 1;
                self.gaps_observed += 1;
                if self.gap_count % GAPS_PER_GROWTH == 0 {
                    let grown = (self.buffer_threshold + GROWTH_STEP).min(MAX_BUFFER_PACKETS);
                    if grown != self.buffer_threshold {
                        info!(
                            "audio delivery gaps observed, growing jitter buffer {} -> {} packets",
                            self.buffer_threshold, grown
                        );
                        self.buffer_threshold = grown;
                    }
                }
            }
        }
        self.last_delivery = Some(now);
    }
}

/// The jitter-buffered packet scheduler. See the module docs for the state
/// machine.
pub struct JitterScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    sink: Arc<dyn PacketSink>,
    pacer: Mutex<Option<JoinHandle<()>>>,
}

impl JitterScheduler {
    /// Create an idle scheduler. `initial_buffer` is the starting pre-buffer
    /// threshold in packets and also its floor when shrinking.
    pub fn new(initial_buffer: usize, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                state: SchedulerState::Idle,
                queue: VecDeque::new(),
                rtp: None,
                silence: None,
                buffer_threshold: initial_buffer,
                min_buffer: initial_buffer,
                burst_done: false,
                marker_pending: true,
                gap_count: 0,
                last_delivery: None,
                audio_packets: 0,
                silence_packets: 0,
                burst_packets: 0,
                gaps_observed: 0,
            })),
            sink,
            pacer: Mutex::new(None),
        }
    }

    /// Install the outbound RTP stream state and silence template for the
    /// negotiated codec. Must happen before any audio is enqueued.
    pub fn configure_stream(&self, rtp: RtpStreamState, silence: SilenceTemplate) {
        let mut inner = self.inner.lock();
        inner.rtp = Some(rtp);
        inner.silence = Some(silence);
    }

    /// Frame and queue encoded payloads, bursting the first few packets out
    /// immediately and starting the pacing task once the pre-buffer
    /// threshold is met. Must be called from within a Tokio runtime.
    ///
    /// Returns the number of packets queued (burst packets included).
    pub fn enqueue(&self, payloads: Vec<(Bytes, Vec<i16>)>) -> usize {
        let mut inner = self.inner.lock();
        if inner.rtp.is_none() {
            warn!("dropping {} packets: no stream configured", payloads.len());
            return 0;
        }

        inner.note_delivery(Instant::now());

        let mut queued = 0;
        for (payload, pcm) in payloads {
            if let Some(entry) = inner.frame(payload, pcm) {
                inner.queue.push_back(entry);
                queued += 1;
            }
        }

        if queued > 0 && inner.state == SchedulerState::Idle {
            inner.state = SchedulerState::Buffering;
        }

        if !inner.burst_done {
            inner.burst_done = true;
            for _ in 0..BURST_PACKETS {
                let Some(entry) = inner.queue.pop_front() else {
                    break;
                };
                inner.audio_packets += 1;
                inner.burst_packets += 1;
                self.sink.transmit(&entry, PacketKind::Audio);
            }
        }

        if inner.state == SchedulerState::Buffering && inner.queue.len() >= inner.buffer_threshold
        {
            inner.state = SchedulerState::Streaming;
            debug!(
                "pre-buffer threshold reached ({} packets), streaming",
                inner.queue.len()
            );
            drop(inner);
            self.spawn_pacer();
        }

        queued
    }

    /// Interruption path: drop everything queued, re-arm the initial burst,
    /// and shrink the pre-buffer threshold. The pacing task, if running,
    /// keeps ticking and covers the gap with silence.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.queue.len();
        inner.queue.clear();
        inner.burst_done = false;
        inner.marker_pending = true;
        let shrunk = inner
            .buffer_threshold
            .saturating_sub(SHRINK_STEP)
            .max(inner.min_buffer);
        inner.buffer_threshold = shrunk;
        debug!("cleared {dropped} queued packets, buffer threshold now {shrunk}");
    }

    /// Stop pacing and return to `Idle`. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(handle) = self.pacer.lock().take() {
            handle.abort();
        }
        let mut inner = self.inner.lock();
        inner.state = SchedulerState::Idle;
        inner.queue.clear();
        inner.burst_done = false;
        inner.marker_pending = true;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    /// Current queue depth in packets.
    pub fn queue_depth(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Diagnostic counters snapshot.
    pub fn stats(&self) -> SchedulerStats {
        let inner = self.inner.lock();
        SchedulerStats {
            audio_packets: inner.audio_packets,
            silence_packets: inner.silence_packets,
            burst_packets: inner.burst_packets,
            gaps_observed: inner.gaps_observed,
            buffer_threshold: inner.buffer_threshold,
            queue_depth: inner.queue.len(),
        }
    }

    fn spawn_pacer(&self) {
        let mut pacer = self.pacer.lock();
        if pacer.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let sink = Arc::clone(&self.sink);
        *pacer = Some(tokio::spawn(async move {
            let mut deadline = Instant::now() + TICK_INTERVAL;
            loop {
                sleep_until(deadline).await;
                deadline += TICK_INTERVAL;

                let mut guard = inner.lock();
                if guard.state != SchedulerState::Streaming {
                    break;
                }
                match guard.queue.pop_front() {
                    Some(entry) => {
                        guard.audio_packets += 1;
                        sink.transmit(&entry, PacketKind::Audio);
                    }
                    None => {
                        if let Some(entry) = guard.frame_silence() {
                            guard.silence_packets += 1;
                            sink.transmit(&entry, PacketKind::Silence);
                        }
                    }
                }
            }
        }));
    }
}

impl Drop for JitterScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pacer.lock().take() {
            handle.abort();
        }
    }
}
