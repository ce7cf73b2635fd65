//! Real-time stereo call recorder.
//!
//! Writes a continuous stereo timeline: left = caller audio, right = the AI
//! audio that was actually transmitted. Both channels are 16-bit 24 kHz; the
//! AI channel is captured at send time, after resampling and after the
//! interruption decision, so the recording matches what each party heard —
//! including the silence a barge-in leaves behind.
//!
//! The writer runs on its own dedicated thread with a drift-corrected 20 ms
//! cadence, decoupled from the 10 ms RTP pacer: inbound and outbound audio
//! arrive on unrelated schedules and meet only in the two [`ChunkQueue`]s.
//! Producers never block on disk I/O; a slow write simply delays the writer
//! thread, whose deadline accumulator then catches up with back-to-back
//! ticks instead of dropping frames.

use crate::chunk_queue::ChunkQueue;
use crate::error::{MediaError, Result};
use crate::AI_SAMPLE_RATE;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Recorder cadence.
pub const RECORDER_TICK: Duration = Duration::from_millis(20);

/// Samples pulled from each channel per tick: 20 ms at 24 kHz.
pub const SAMPLES_PER_TICK: usize = 480;

/// Producer-side handle: the two channel queues the bridge feeds.
#[derive(Default)]
pub struct RecorderChannels {
    caller: Mutex<ChunkQueue>,
    ai: Mutex<ChunkQueue>,
}

impl RecorderChannels {
    /// Create empty channel queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append caller audio (24 kHz PCM).
    pub fn push_caller(&self, pcm: Vec<i16>) {
        self.caller.lock().push(pcm);
    }

    /// Append transmitted AI audio (24 kHz PCM).
    pub fn push_ai(&self, pcm: Vec<i16>) {
        self.ai.lock().push(pcm);
    }

    fn is_drained(&self) -> bool {
        self.caller.lock().is_empty() && self.ai.lock().is_empty()
    }

    fn pull_frame(&self) -> (Vec<i16>, Vec<i16>) {
        let caller = self.caller.lock().pull(SAMPLES_PER_TICK);
        let ai = self.ai.lock().pull(SAMPLES_PER_TICK);
        (caller, ai)
    }
}

/// The recorder: a writer thread plus the shared channel queues.
pub struct CallRecorder {
    channels: Arc<RecorderChannels>,
    running: Arc<AtomicBool>,
    writer_thread: Option<thread::JoinHandle<()>>,
}

impl CallRecorder {
    /// Open the output file and start the writer thread. A failure to create
    /// the file is a setup error and propagates; write failures after that
    /// are logged and end the recording without touching the call.
    pub fn start(path: &Path, channels: Arc<RecorderChannels>) -> Result<Self> {
        let spec = WavSpec {
            channels: 2,
            sample_rate: AI_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)
            .map_err(|e| MediaError::recording(format!("cannot create {}: {e}", path.display())))?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread_channels = Arc::clone(&channels);
        let path_label = path.display().to_string();

        let writer_thread = thread::Builder::new()
            .name("call-recorder".into())
            .spawn(move || {
                let mut deadline = Instant::now() + RECORDER_TICK;
                while thread_running.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                    deadline += RECORDER_TICK;

                    if !write_frame(&mut writer, &thread_channels) {
                        return;
                    }
                }

                // Flush whatever is still queued, padding the shorter
                // channel, so the file never ends mid-frame.
                while !thread_channels.is_drained() {
                    if !write_frame(&mut writer, &thread_channels) {
                        return;
                    }
                }

                match writer.finalize() {
                    Ok(()) => info!("recording finalized: {path_label}"),
                    Err(e) => error!("failed to finalize recording {path_label}: {e}"),
                }
            })
            .map_err(|e| MediaError::recording(format!("cannot spawn writer thread: {e}")))?;

        debug!("recording to {}", path.display());
        Ok(Self {
            channels,
            running,
            writer_thread: Some(writer_thread),
        })
    }

    /// Producer-side handle.
    pub fn channels(&self) -> Arc<RecorderChannels> {
        Arc::clone(&self.channels)
    }

    /// Stop the writer: drain both queues to completion and close the file.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.writer_thread.take() {
            if handle.join().is_err() {
                error!("recorder writer thread panicked");
            }
        }
    }
}

impl Drop for CallRecorder {
    fn drop(&mut self) {
        if self.writer_thread.is_some() {
            self.shutdown();
        }
    }
}

/// Write one interleaved stereo frame. Returns `false` after a write error,
/// which ends the recording.
fn write_frame<W>(writer: &mut WavWriter<W>, channels: &RecorderChannels) -> bool
where
    W: std::io::Write + std::io::Seek,
{
    let (caller, ai) = channels.pull_frame();
    for (l, r) in caller.iter().zip(ai.iter()) {
        if let Err(e) = writer.write_sample(*l).and_then(|()| writer.write_sample(*r)) {
            error!("recording write failed, stopping recorder: {e}");
            return false;
        }
    }
    true
}
