//! Per-response packet accounting.
//!
//! For every AI utterance the tracker counts packets queued against packets
//! actually placed on the wire. The sent counter is advanced synchronously
//! from the pacing tick that performs the send, which makes
//! `playback_position_ms` the authoritative "how much has the far end
//! actually heard" clock — the value truncation is driven by.
//!
//! Completion callbacks fire exactly once, when a response's sent count
//! catches up to its queued count. A safety deadline force-fires a callback
//! whose accounting never completes; that path is a correctness net against
//! lost events, and its firing is logged as a warning to investigate, never
//! business as usual.

use crate::types::ResponseId;
use parking_lot::Mutex;
use sipbridge_codec_core::PACKET_DURATION_MS;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback invoked when a response finishes playing.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Margin before firing a callback registered after playback already
/// completed, letting the last packet actually leave the queue.
pub const COMPLETION_MARGIN: Duration = Duration::from_millis(100);

struct ResponseEntry {
    id: ResponseId,
    packets_queued: u64,
    packets_sent: u64,
    callback: Option<CompletionCallback>,
    timer: Option<JoinHandle<()>>,
}

impl ResponseEntry {
    fn is_complete(&self) -> bool {
        self.packets_queued > 0 && self.packets_sent >= self.packets_queued
    }
}

#[derive(Default)]
struct TrackerInner {
    /// Insertion order is load-bearing: `on_packet_sent` advances the first
    /// incomplete response, and the interruption fallback picks the first
    /// match in tracking order.
    entries: Vec<ResponseEntry>,
}

impl TrackerInner {
    fn entry_mut(&mut self, id: &ResponseId) -> Option<&mut ResponseEntry> {
        self.entries.iter_mut().find(|e| &e.id == id)
    }

    fn entry_or_insert(&mut self, id: &ResponseId) -> &mut ResponseEntry {
        if let Some(pos) = self.entries.iter().position(|e| &e.id == id) {
            &mut self.entries[pos]
        } else {
            self.entries.push(ResponseEntry {
                id: id.clone(),
                packets_queued: 0,
                packets_sent: 0,
                callback: None,
                timer: None,
            });
            self.entries.last_mut().expect("just pushed")
        }
    }

    fn remove(&mut self, id: &ResponseId) -> Option<ResponseEntry> {
        let pos = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(pos))
    }
}

/// Tracks queued-vs-sent packets per response id. Cheap to clone and share.
#[derive(Clone)]
pub struct ResponseAudioTracker {
    inner: Arc<Mutex<TrackerInner>>,
    safety_deadline: Duration,
}

impl ResponseAudioTracker {
    /// Create a tracker with the given completion safety deadline.
    pub fn new(safety_deadline: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner::default())),
            safety_deadline,
        }
    }

    /// Record that `packet_count` packets were queued for `id`, creating the
    /// tracking entry if this is the response's first audio.
    pub fn on_audio_queued(&self, id: &ResponseId, packet_count: u64) {
        let mut inner = self.inner.lock();
        let entry = inner.entry_or_insert(id);
        entry.packets_queued += packet_count;
    }

    /// Record one real payload packet placed on the wire. Silence packets
    /// must not be reported here — they belong to no response.
    ///
    /// Advances the first response in insertion order with unsent packets;
    /// when it catches up and a callback is registered, the callback fires
    /// (exactly once) and the entry is dropped.
    pub fn on_packet_sent(&self) {
        let fired = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner
                .entries
                .iter_mut()
                .find(|e| e.packets_sent < e.packets_queued)
            else {
                return;
            };
            entry.packets_sent += 1;

            if entry.is_complete() && entry.callback.is_some() {
                let id = entry.id.clone();
                let mut entry = inner.remove(&id).expect("entry present");
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                debug!("response {id} playback complete");
                entry.callback.take()
            } else {
                None
            }
        };

        if let Some(callback) = fired {
            callback();
        }
    }

    /// Register a completion callback for `id`.
    ///
    /// If playback already completed, the callback fires after a short
    /// margin. Otherwise it is stored, and a safety deadline is armed that
    /// force-fires it if packet accounting never completes — defensive
    /// against lost or miscounted events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn notify_when_complete(&self, id: &ResponseId, callback: CompletionCallback) {
        let mut inner = self.inner.lock();
        let entry = inner.entry_or_insert(id);

        if entry.is_complete() {
            let id = id.clone();
            let tracker = self.clone();
            let mut callback = Some(callback);
            entry.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(COMPLETION_MARGIN).await;
                tracker.inner.lock().remove(&id);
                if let Some(callback) = callback.take() {
                    callback();
                }
            }));
            return;
        }

        entry.callback = Some(callback);

        let id = id.clone();
        let tracker = self.clone();
        let deadline = self.safety_deadline;
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let callback = {
                let mut inner = tracker.inner.lock();
                let pending = inner
                    .entry_mut(&id)
                    .map(|e| e.callback.is_some())
                    .unwrap_or(false);
                if pending {
                    let mut entry = inner.remove(&id).expect("entry present");
                    warn!(
                        "response {id} never completed packet accounting ({}/{} sent), \
                         force-firing completion",
                        entry.packets_sent, entry.packets_queued
                    );
                    entry.callback.take()
                } else {
                    None
                }
            };
            if let Some(callback) = callback {
                callback();
            }
        }));
    }

    /// Drop all stored callbacks and safety timers without firing them. A
    /// superseded response's completion is irrelevant once canceled; packet
    /// counters are kept so position queries stay valid.
    pub fn cancel_pending(&self) {
        let mut inner = self.inner.lock();
        for entry in &mut inner.entries {
            entry.callback = None;
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
    }

    /// Full teardown: cancel everything and forget all responses.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for entry in &mut inner.entries {
            entry.callback = None;
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
        inner.entries.clear();
    }

    /// The response currently being played out: the first, in insertion
    /// order, with unsent packets. When several canceled responses are still
    /// mid-cleanup this first-match rule is an approximation inherited from
    /// the original design, not a guaranteed mapping.
    pub fn currently_playing(&self) -> Option<ResponseId> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|e| e.packets_sent < e.packets_queued)
            .map(|e| e.id.clone())
    }

    /// Milliseconds of `id`'s audio actually transmitted.
    pub fn playback_position_ms(&self, id: &ResponseId) -> u64 {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|e| &e.id == id)
            .map(|e| e.packets_sent * PACKET_DURATION_MS as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_callback() -> (Arc<AtomicU32>, CompletionCallback) {
        let count = Arc::new(AtomicU32::new(0));
        let cloned = Arc::clone(&count);
        (count, Box::new(move || {
            cloned.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn tracker() -> ResponseAudioTracker {
        ResponseAudioTracker::new(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_fires_exactly_once() {
        let tracker = tracker();
        let id = ResponseId::from("r1");
        let (count, callback) = counting_callback();

        tracker.on_audio_queued(&id, 10);
        tracker.notify_when_complete(&id, callback);

        for _ in 0..10 {
            tracker.on_packet_sent();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Extra sends and a late cancel are no-ops.
        tracker.on_packet_sent();
        tracker.cancel_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.currently_playing(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_after_completion_fires_with_margin() {
        let tracker = tracker();
        let id = ResponseId::from("r1");

        tracker.on_audio_queued(&id, 2);
        tracker.on_packet_sent();
        tracker.on_packet_sent();

        let (count, callback) = counting_callback();
        tracker.notify_when_complete(&id, callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(COMPLETION_MARGIN + Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_deadline_force_fires() {
        let tracker = ResponseAudioTracker::new(Duration::from_secs(10));
        let id = ResponseId::from("r1");
        let (count, callback) = counting_callback();

        tracker.on_audio_queued(&id, 10);
        for _ in 0..4 {
            tracker.on_packet_sent();
        }
        tracker.notify_when_complete(&id, callback);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The force-fired entry is gone; more sends cannot re-fire it.
        tracker.on_packet_sent();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_suppresses_callback() {
        let tracker = tracker();
        let id = ResponseId::from("r1");
        let (count, callback) = counting_callback();

        tracker.on_audio_queued(&id, 3);
        tracker.notify_when_complete(&id, callback);
        tracker.cancel_pending();

        for _ in 0..3 {
            tracker.on_packet_sent();
        }
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Counters survive cancellation.
        assert_eq!(tracker.playback_position_ms(&id), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_order_accounting() {
        let tracker = tracker();
        let a = ResponseId::from("a");
        let b = ResponseId::from("b");

        tracker.on_audio_queued(&a, 2);
        tracker.on_audio_queued(&b, 2);
        assert_eq!(tracker.currently_playing(), Some(a.clone()));

        tracker.on_packet_sent();
        tracker.on_packet_sent();
        assert_eq!(tracker.currently_playing(), Some(b.clone()));
        assert_eq!(tracker.playback_position_ms(&a), 20);
        assert_eq!(tracker.playback_position_ms(&b), 0);

        tracker.on_packet_sent();
        assert_eq!(tracker.playback_position_ms(&b), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_before_any_audio() {
        let tracker = tracker();
        let id = ResponseId::from("r1");
        let (count, callback) = counting_callback();

        // Entry created by the notify itself; zero queued is not complete.
        tracker.notify_when_complete(&id, callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tracker.on_audio_queued(&id, 1);
        tracker.on_packet_sent();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
