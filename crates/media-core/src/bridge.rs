//! The audio bridge orchestrator.
//!
//! Owns the UDP endpoint and wires the pipeline together. Outbound: AI PCM
//! at 24 kHz is resampled to the negotiated codec's rate, sliced into 10 ms
//! frames, encoded, framed as RTP and handed to the jitter scheduler, with
//! queued-packet counts registered per response. Inbound: RTP datagrams are
//! parsed, validated against the negotiated payload type, decoded, logged to
//! the recorder's caller channel, resampled to 24 kHz and emitted as
//! [`BridgeEvent::AudioReceived`].
//!
//! The UDP socket is exclusively owned here; every outbound packet funnels
//! through the single pacing task so RTP sequence and timestamp order on the
//! wire matches allocation order.

use crate::config::AudioBridgeConfig;
use crate::error::{MediaError, Result};
use crate::events::{pcm_from_bytes, AiEvent, BridgeEvent, SipEvent};
use crate::recorder::{CallRecorder, RecorderChannels};
use crate::resample::resample_rate;
use crate::response_tracker::ResponseAudioTracker;
use crate::scheduler::{
    JitterQueueEntry, JitterScheduler, PacketKind, PacketSink, SilenceTemplate,
};
use crate::transcript::TranscriptCorrelator;
use crate::types::ResponseId;
use crate::AI_SAMPLE_RATE;
use bytes::Bytes;
use parking_lot::Mutex;
use sipbridge_codec_core::{AudioCodec, CodecRegistry, PACKET_DURATION_MS};
use sipbridge_codec_core::registry::TELEPHONE_EVENT_PAYLOAD_TYPE;
use sipbridge_rtp_core::{RtpHeader, RtpPacket, RtpStreamState};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Delay before the NAT-opening probe fires.
const NAT_PROBE_DELAY: Duration = Duration::from_millis(500);

/// State tied to the negotiated codec.
struct NegotiatedCodec {
    encoder: Box<dyn AudioCodec>,
    decoder: Box<dyn AudioCodec>,
    payload_type: u8,
    sample_rate: u32,
    samples_per_packet: usize,
    /// Codec-rate samples not yet forming a whole 10 ms frame; carried
    /// across audio deltas, dropped on interruption.
    pending_pcm: Vec<i16>,
}

/// Inbound/outbound packet counters.
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Valid RTP packets received and decoded
    pub packets_received: u64,
    /// Inbound packets dropped for parse or payload-type reasons
    pub packets_dropped: u64,
}

struct BridgeInner {
    config: AudioBridgeConfig,
    events: UnboundedSender<BridgeEvent>,
    scheduler: Arc<JitterScheduler>,
    tracker: ResponseAudioTracker,
    transcripts: Mutex<TranscriptCorrelator>,

    socket: Mutex<Option<Arc<UdpSocket>>>,
    local_port: Mutex<Option<u16>>,
    remote: Mutex<Option<SocketAddr>>,
    negotiated: Mutex<Option<NegotiatedCodec>>,
    native_rate: AtomicU32,

    recorder: Mutex<Option<CallRecorder>>,
    recorder_channels: Mutex<Option<Arc<RecorderChannels>>>,

    inbound_task: Mutex<Option<JoinHandle<()>>>,
    watchdog_task: Mutex<Option<JoinHandle<()>>>,
    probe_task: Mutex<Option<JoinHandle<()>>>,

    last_rx: Mutex<Instant>,
    has_received_audio: AtomicBool,
    rx_notify: Notify,

    packets_received: AtomicU64,
    packets_dropped: AtomicU64,
}

impl BridgeInner {
    fn emit(&self, event: BridgeEvent) {
        let _ = self.events.send(event);
    }

    /// Inbound datagram path: parse, validate, decode, record, resample,
    /// emit. All failures are contained here — a bad packet never mutates
    /// state.
    fn handle_incoming(&self, data: &[u8], source: SocketAddr) {
        let packet = match RtpPacket::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dropping malformed RTP packet from {source}: {e}");
                return;
            }
        };

        let pcm_native = {
            let mut guard = self.negotiated.lock();
            let Some(negotiated) = guard.as_mut() else {
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("dropping RTP packet: no codec negotiated yet");
                return;
            };
            if packet.header.payload_type != negotiated.payload_type {
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                if packet.header.payload_type == TELEPHONE_EVENT_PAYLOAD_TYPE {
                    debug!("ignoring telephone-event packet");
                } else {
                    warn!(
                        "dropping RTP packet with payload type {} (negotiated {})",
                        packet.header.payload_type, negotiated.payload_type
                    );
                }
                return;
            }
            match negotiated.decoder.decode(&packet.payload) {
                Ok(pcm) => pcm,
                Err(e) => {
                    self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("failed to decode inbound audio: {e}");
                    return;
                }
            }
        };

        self.packets_received.fetch_add(1, Ordering::Relaxed);
        *self.last_rx.lock() = Instant::now();
        self.has_received_audio.store(true, Ordering::Release);
        self.rx_notify.notify_one();

        let pcm24k = resample_rate(
            &pcm_native,
            self.native_rate.load(Ordering::Acquire),
            AI_SAMPLE_RATE,
        );

        if let Some(channels) = self.recorder_channels.lock().as_ref() {
            channels.push_caller(pcm24k.clone());
        }

        self.emit(BridgeEvent::AudioReceived { pcm: pcm24k });
    }
}

/// Packet sink wired into the jitter scheduler: transmits on the socket,
/// advances per-response accounting, and logs the transmitted PCM to the
/// recorder — synchronously, in tick order.
struct BridgeSink {
    inner: Weak<BridgeInner>,
}

impl PacketSink for BridgeSink {
    fn transmit(&self, entry: &JitterQueueEntry, kind: PacketKind) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let socket = inner.socket.lock().clone();
        let remote = *inner.remote.lock();
        if let (Some(socket), Some(remote)) = (socket, remote) {
            if let Err(e) = socket.try_send_to(&entry.packet, remote) {
                // Telephony RTP is lossy-tolerant; the pacer keeps going.
                debug!("RTP send to {remote} failed: {e}");
            }
        }

        if kind == PacketKind::Audio {
            inner.tracker.on_packet_sent();
        }

        let recorder_channels = inner.recorder_channels.lock();
        if let Some(channels) = recorder_channels.as_ref() {
            let native = inner.native_rate.load(Ordering::Acquire);
            channels.push_ai(resample_rate(&entry.source_pcm, native, AI_SAMPLE_RATE));
        }
    }
}

/// The audio bridge. One instance per call; all state is call-scoped.
pub struct AudioBridge {
    registry: Arc<CodecRegistry>,
    inner: Arc<BridgeInner>,
}

impl AudioBridge {
    /// Create a bridge and the event stream its collaborators consume.
    pub fn new(
        config: AudioBridgeConfig,
        registry: Arc<CodecRegistry>,
    ) -> (Self, UnboundedReceiver<BridgeEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tracker = ResponseAudioTracker::new(config.completion_safety_deadline());
        let initial_buffer = config.initial_buffer_packets;

        let inner = Arc::new_cyclic(|weak: &Weak<BridgeInner>| {
            let sink = Arc::new(BridgeSink {
                inner: weak.clone(),
            });
            BridgeInner {
                config,
                events: events_tx,
                scheduler: Arc::new(JitterScheduler::new(initial_buffer, sink)),
                tracker,
                transcripts: Mutex::new(TranscriptCorrelator::new()),
                socket: Mutex::new(None),
                local_port: Mutex::new(None),
                remote: Mutex::new(None),
                negotiated: Mutex::new(None),
                native_rate: AtomicU32::new(AI_SAMPLE_RATE),
                recorder: Mutex::new(None),
                recorder_channels: Mutex::new(None),
                inbound_task: Mutex::new(None),
                watchdog_task: Mutex::new(None),
                probe_task: Mutex::new(None),
                last_rx: Mutex::new(Instant::now()),
                has_received_audio: AtomicBool::new(false),
                rx_notify: Notify::new(),
                packets_received: AtomicU64::new(0),
                packets_dropped: AtomicU64::new(0),
            }
        });

        (Self { registry, inner }, events_rx)
    }

    /// Bind the UDP endpoint, arm the inbound listener and the inactivity
    /// watchdog, and start the recorder when enabled. Idempotent: calling
    /// again on an active bridge returns the existing port.
    pub async fn start(&self) -> Result<u16> {
        if let Some(port) = *self.inner.local_port.lock() {
            return Ok(port);
        }

        let bind_addr = format!(
            "{}:{}",
            self.inner.config.local_host, self.inner.config.local_port
        );
        let socket = Arc::new(UdpSocket::bind(&bind_addr).await?);
        let port = socket.local_addr()?.port();
        info!("audio bridge listening on {bind_addr} (port {port})");

        if self.inner.config.recording.enabled {
            let path = self
                .inner
                .config
                .recording
                .path
                .clone()
                .ok_or_else(|| MediaError::recording("recording enabled without a filename"))?;
            let channels = Arc::new(RecorderChannels::new());
            let recorder = CallRecorder::start(&path, Arc::clone(&channels))?;
            *self.inner.recorder_channels.lock() = Some(channels);
            *self.inner.recorder.lock() = Some(recorder);
        }

        *self.inner.socket.lock() = Some(Arc::clone(&socket));
        *self.inner.local_port.lock() = Some(port);
        *self.inner.last_rx.lock() = Instant::now();

        let inbound_inner = Arc::clone(&self.inner);
        let inbound_socket = Arc::clone(&socket);
        *self.inner.inbound_task.lock() = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                match inbound_socket.recv_from(&mut buf).await {
                    Ok((len, source)) => inbound_inner.handle_incoming(&buf[..len], source),
                    Err(e) => {
                        error!("RTP socket receive failed: {e}");
                        break;
                    }
                }
            }
        }));

        let watchdog_inner = Arc::clone(&self.inner);
        *self.inner.watchdog_task.lock() = Some(tokio::spawn(async move {
            run_inactivity_watchdog(watchdog_inner).await;
        }));

        Ok(port)
    }

    /// Tear down socket, pacing and recorder, in that order. Cancels all
    /// per-response bookkeeping unconditionally.
    pub async fn stop(&self) {
        for task in [
            self.inner.probe_task.lock().take(),
            self.inner.inbound_task.lock().take(),
            self.inner.watchdog_task.lock().take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }

        *self.inner.socket.lock() = None;
        *self.inner.local_port.lock() = None;

        self.inner.scheduler.stop();

        let recorder = self.inner.recorder.lock().take();
        *self.inner.recorder_channels.lock() = None;
        if let Some(recorder) = recorder {
            recorder.stop();
        }

        self.inner.tracker.clear();
        self.inner.transcripts.lock().clear();
        *self.inner.negotiated.lock() = None;
        *self.inner.remote.lock() = None;
        self.inner.has_received_audio.store(false, Ordering::Release);
        info!("audio bridge stopped");
    }

    /// The bound RTP port, known before the SDP answer is built.
    pub fn local_rtp_port(&self) -> Option<u16> {
        *self.inner.local_port.lock()
    }

    /// Select the codec for the call. An unsupported payload type leaves
    /// audio processing disabled and is reported to the caller.
    pub fn set_negotiated_codec(&self, payload_type: u8) -> Result<()> {
        let (encoder, decoder, silence_codec) = match (
            self.registry.create(payload_type),
            self.registry.create(payload_type),
            self.registry.create(payload_type),
        ) {
            (Some(e), Some(d), Some(s)) => (e, d, s),
            _ => {
                error!("cannot negotiate unsupported payload type {payload_type}");
                return Err(MediaError::UnsupportedPayloadType { payload_type });
            }
        };

        let info = encoder.info();
        let samples_per_packet = info.samples_per_packet(PACKET_DURATION_MS);

        let mut silence_codec = silence_codec;
        let silence_pcm = vec![0i16; samples_per_packet];
        let silence_payload = silence_codec.encode(&silence_pcm)?;

        let mut rtp = RtpStreamState::new(payload_type);
        rtp.set_cadence(samples_per_packet as u32, info.sample_rate, info.clock_rate);
        self.inner.scheduler.configure_stream(
            rtp,
            SilenceTemplate {
                payload: Bytes::from(silence_payload),
                pcm: silence_pcm,
            },
        );

        self.inner
            .native_rate
            .store(info.sample_rate, Ordering::Release);
        *self.inner.negotiated.lock() = Some(NegotiatedCodec {
            encoder,
            decoder,
            payload_type,
            sample_rate: info.sample_rate,
            samples_per_packet,
            pending_pcm: Vec::new(),
        });

        info!(
            "negotiated codec {} (payload type {payload_type}, {} Hz)",
            info.name, info.sample_rate
        );
        Ok(())
    }

    /// Record the remote RTP endpoint and schedule a best-effort NAT probe:
    /// one minimal packet, sent only if no inbound audio has shown up by
    /// then. Purely a traversal aid.
    pub fn set_remote_endpoint(&self, host: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| MediaError::InvalidEndpoint {
                details: format!("{host}:{port}: {e}"),
            })?;
        *self.inner.remote.lock() = Some(addr);
        debug!("remote RTP endpoint set to {addr}");

        let inner = Arc::clone(&self.inner);
        let mut probe_guard = self.inner.probe_task.lock();
        if let Some(task) = probe_guard.take() {
            task.abort();
        }
        *probe_guard = Some(tokio::spawn(async move {
            sleep(NAT_PROBE_DELAY).await;
            if inner.has_received_audio.load(Ordering::Acquire) {
                return;
            }
            let socket = inner.socket.lock().clone();
            let payload_type = inner
                .negotiated
                .lock()
                .as_ref()
                .map(|n| n.payload_type)
                .unwrap_or(0);
            if let Some(socket) = socket {
                let probe = RtpHeader::new(payload_type, 0, 0, 0).serialize();
                match socket.try_send_to(&probe, addr) {
                    Ok(_) => debug!("sent NAT probe to {addr}"),
                    Err(e) => debug!("NAT probe to {addr} failed: {e}"),
                }
            }
        }));

        Ok(())
    }

    /// Queue AI audio (24 kHz PCM) for transmission under `response_id`.
    /// Returns the number of 10 ms packets enqueued; a trailing partial
    /// frame is carried over to the next delta.
    pub fn send_audio(&self, pcm24k: &[i16], response_id: &ResponseId) -> Result<usize> {
        let payloads = {
            let mut guard = self.inner.negotiated.lock();
            let negotiated = guard.as_mut().ok_or(MediaError::NoCodecNegotiated)?;

            let native = resample_rate(pcm24k, AI_SAMPLE_RATE, negotiated.sample_rate);
            negotiated.pending_pcm.extend_from_slice(&native);

            let frame = negotiated.samples_per_packet;
            let mut payloads = Vec::new();
            while negotiated.pending_pcm.len() >= frame {
                let chunk: Vec<i16> = negotiated.pending_pcm.drain(..frame).collect();
                let encoded = negotiated.encoder.encode(&chunk)?;
                payloads.push((Bytes::from(encoded), chunk));
            }
            payloads
        };

        let count = payloads.len();
        if count > 0 {
            // Queued counts must land before the enqueue: the scheduler may
            // burst packets out synchronously, and sent accounting needs the
            // response on file.
            self.inner.tracker.on_audio_queued(response_id, count as u64);
            self.inner.scheduler.enqueue(payloads);
        }
        Ok(count)
    }

    /// Interruption path: flush pending output. Empties the RTP queue and
    /// the partial-frame carry, re-arms the burst, shrinks the jitter
    /// buffer. The recorder's queues are deliberately left alone so the
    /// recording keeps an accurate timeline of the interruption itself.
    pub fn clear_audio_buffer(&self) {
        self.inner.scheduler.clear();
        if let Some(negotiated) = self.inner.negotiated.lock().as_mut() {
            negotiated.pending_pcm.clear();
        }
    }

    /// Pass-through to the tracker's completion registration.
    pub fn notify_when_response_complete(
        &self,
        response_id: &ResponseId,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) {
        self.inner.tracker.notify_when_complete(response_id, callback);
    }

    /// Pass-through to the tracker's cancellation.
    pub fn cancel_pending_callbacks(&self) {
        self.inner.tracker.cancel_pending();
    }

    /// The response currently being transmitted, if any.
    pub fn playing_response_id(&self) -> Option<ResponseId> {
        self.inner.tracker.currently_playing()
    }

    /// Playback position of the currently playing response.
    pub fn playback_position_ms(&self) -> u64 {
        self.playing_response_id()
            .map(|id| self.inner.tracker.playback_position_ms(&id))
            .unwrap_or(0)
    }

    /// Inbound counters snapshot.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            packets_received: self.inner.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.inner.packets_dropped.load(Ordering::Relaxed),
        }
    }

    /// Scheduler diagnostics snapshot.
    pub fn scheduler_stats(&self) -> crate::scheduler::SchedulerStats {
        self.inner.scheduler.stats()
    }

    /// Dispatch an event from the SIP collaborator.
    pub async fn handle_sip_event(&self, event: SipEvent) -> Result<()> {
        match event {
            SipEvent::CallAnswered {
                payload_type,
                remote_host,
                remote_port,
            } => {
                self.set_negotiated_codec(payload_type)?;
                self.set_remote_endpoint(&remote_host, remote_port)?;
                Ok(())
            }
            SipEvent::CallEnded => {
                self.stop().await;
                Ok(())
            }
        }
    }

    /// Dispatch an event from the AI collaborator. Per-event failures are
    /// contained and logged; nothing here halts the call.
    pub fn handle_ai_event(&self, event: AiEvent) {
        match event {
            AiEvent::ResponseCreated { response_id } => {
                self.inner.transcripts.lock().start_response(&response_id);
            }
            AiEvent::TextDelta { response_id, text } => {
                self.inner
                    .transcripts
                    .lock()
                    .on_text_delta(&response_id, &text);
            }
            AiEvent::AudioDelta { response_id, audio } => {
                self.inner.transcripts.lock().on_audio_delta(
                    &response_id,
                    audio.len(),
                    AI_SAMPLE_RATE,
                );
                let pcm = pcm_from_bytes(&audio);
                if let Err(e) = self.send_audio(&pcm, &response_id) {
                    warn!("dropping audio delta for {response_id}: {e}");
                }
            }
            AiEvent::ResponseDone { response_id } => {
                self.on_response_done(response_id);
            }
            AiEvent::UserSpeechStarted => {
                self.interrupt();
            }
            AiEvent::EndCallRequested {
                response_id,
                reason,
            } => {
                let inner = Arc::clone(&self.inner);
                self.inner.tracker.notify_when_complete(
                    &response_id,
                    Box::new(move || {
                        inner.emit(BridgeEvent::CallEndReady { reason });
                    }),
                );
            }
        }
    }

    /// Barge-in: report what was audibly spoken of the playing response,
    /// cancel its pending completion, and flush the output pipeline.
    ///
    /// When no per-response mapping is available the first response in
    /// tracking order with unsent packets is used — an approximation
    /// inherited from the original design.
    pub fn interrupt(&self) {
        if let Some(response_id) = self.inner.tracker.currently_playing() {
            let played_ms = self.inner.tracker.playback_position_ms(&response_id);
            let split = {
                let mut transcripts = self.inner.transcripts.lock();
                let split = transcripts.truncated_with_planned(&response_id, played_ms);
                transcripts.cleanup(&response_id);
                split
            };
            info!(
                "response {response_id} interrupted at {played_ms}ms: \"{}\"",
                split.spoken
            );
            self.inner.emit(BridgeEvent::ResponseInterrupted {
                response_id,
                played_ms,
                spoken: split.spoken,
                planned: split.planned,
            });
        }

        self.inner.tracker.cancel_pending();
        self.clear_audio_buffer();
    }

    /// A response finished generating. If it produced audio, completion is
    /// reported when the last packet leaves the wire; otherwise a grace
    /// period decides that it was text-only.
    fn on_response_done(&self, response_id: ResponseId) {
        if self.inner.transcripts.lock().has_audio(&response_id) {
            self.arm_completion(response_id);
            return;
        }

        let inner = Arc::clone(&self.inner);
        let grace = self.inner.config.no_audio_grace();
        tokio::spawn(async move {
            sleep(grace).await;
            if inner.socket.lock().is_none() {
                // The call was torn down while the grace period ran.
                return;
            }
            let has_audio = inner.transcripts.lock().has_audio(&response_id);
            if has_audio {
                arm_completion_inner(&inner, response_id);
            } else {
                debug!("response {response_id} produced no audio");
                let transcript = {
                    let mut transcripts = inner.transcripts.lock();
                    let text = transcripts.full_transcript(&response_id);
                    transcripts.cleanup(&response_id);
                    text
                };
                if !transcript.is_empty() {
                    info!("AI (text-only): \"{transcript}\"");
                }
                inner.emit(BridgeEvent::ResponseComplete { response_id });
            }
        });
    }

    fn arm_completion(&self, response_id: ResponseId) {
        arm_completion_inner(&self.inner, response_id);
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        for task in [
            self.inner.probe_task.lock().take(),
            self.inner.inbound_task.lock().take(),
            self.inner.watchdog_task.lock().take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        self.inner.scheduler.stop();
        self.inner.tracker.clear();
    }
}

fn arm_completion_inner(inner: &Arc<BridgeInner>, response_id: ResponseId) {
    let callback_inner = Arc::clone(inner);
    let callback_id = response_id.clone();
    inner.tracker.notify_when_complete(
        &response_id,
        Box::new(move || {
            let transcript = {
                let mut transcripts = callback_inner.transcripts.lock();
                let text = transcripts.full_transcript(&callback_id);
                transcripts.cleanup(&callback_id);
                text
            };
            if !transcript.is_empty() {
                info!("AI said: \"{transcript}\"");
            }
            callback_inner.emit(BridgeEvent::ResponseComplete {
                response_id: callback_id,
            });
        }),
    );
}

/// Watches for inbound RTP going quiet after audio has flowed, emitting
/// exactly one [`BridgeEvent::RtpTimeout`] per silence period. This is the
/// primary signal for detecting a silent hangup (no BYE ever arrives).
async fn run_inactivity_watchdog(inner: Arc<BridgeInner>) {
    let timeout = inner.config.rtp_inactivity_timeout();
    let mut fired = false;

    loop {
        let flowed = inner.has_received_audio.load(Ordering::Acquire);
        if !flowed || fired {
            // Nothing to time out yet (or already reported): wait for the
            // next valid packet.
            inner.rx_notify.notified().await;
            fired = false;
            continue;
        }

        let deadline = *inner.last_rx.lock() + timeout;
        tokio::select! {
            _ = inner.rx_notify.notified() => continue,
            _ = sleep_until(deadline) => {
                let last = *inner.last_rx.lock();
                if Instant::now().duration_since(last) >= timeout {
                    warn!("no inbound RTP for {timeout:?}, signaling timeout");
                    inner.emit(BridgeEvent::RtpTimeout);
                    fired = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<CodecRegistry> {
        Arc::new(CodecRegistry::with_defaults())
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (bridge, _events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        let port = bridge.start().await.unwrap();
        assert!(port > 0);
        assert_eq!(bridge.start().await.unwrap(), port);
        assert_eq!(bridge.local_rtp_port(), Some(port));
        bridge.stop().await;
        assert_eq!(bridge.local_rtp_port(), None);
    }

    #[tokio::test]
    async fn test_unsupported_codec_is_error() {
        let (bridge, _events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        let err = bridge.set_negotiated_codec(42).unwrap_err();
        assert!(matches!(
            err,
            MediaError::UnsupportedPayloadType { payload_type: 42 }
        ));
    }

    #[tokio::test]
    async fn test_send_audio_without_codec_is_error() {
        let (bridge, _events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        let err = bridge
            .send_audio(&[0i16; 240], &ResponseId::from("r"))
            .unwrap_err();
        assert!(matches!(err, MediaError::NoCodecNegotiated));
    }

    #[tokio::test]
    async fn test_partial_frames_carry_over() {
        let (bridge, _events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        bridge.set_negotiated_codec(8).unwrap();

        let id = ResponseId::from("r");
        // 120 samples at 24kHz -> 40 at 8kHz: half a frame, nothing queued.
        assert_eq!(bridge.send_audio(&[500i16; 120], &id).unwrap(), 0);
        // Another half frame completes one packet.
        assert_eq!(bridge.send_audio(&[500i16; 120], &id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_partial_carry() {
        let (bridge, _events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        bridge.set_negotiated_codec(8).unwrap();

        let id = ResponseId::from("r");
        assert_eq!(bridge.send_audio(&[500i16; 120], &id).unwrap(), 0);
        bridge.clear_audio_buffer();
        // The carried half-frame was flushed; this half-frame starts fresh.
        assert_eq!(bridge.send_audio(&[500i16; 120], &id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_text_only_response_completes_after_grace() {
        let mut config = AudioBridgeConfig::default();
        config.no_audio_grace_ms = 20;
        let (bridge, mut events) = AudioBridge::new(config, registry());
        bridge.start().await.unwrap();

        let id = ResponseId::from("r1");
        bridge.handle_ai_event(AiEvent::ResponseCreated {
            response_id: id.clone(),
        });
        bridge.handle_ai_event(AiEvent::TextDelta {
            response_id: id.clone(),
            text: "only text".into(),
        });
        bridge.handle_ai_event(AiEvent::ResponseDone {
            response_id: id.clone(),
        });

        let event = tokio::time::timeout(Duration::from_millis(500), events.recv())
            .await
            .expect("event within grace window")
            .expect("channel open");
        assert_eq!(event, BridgeEvent::ResponseComplete { response_id: id });
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_interrupt_without_playback_is_quiet() {
        let (bridge, mut events) = AudioBridge::new(AudioBridgeConfig::default(), registry());
        bridge.interrupt();
        assert!(events.try_recv().is_err());
    }
}
