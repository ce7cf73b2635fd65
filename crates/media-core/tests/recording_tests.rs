//! Recording behavior across the interruption path.

use sipbridge_codec_core::CodecRegistry;
use sipbridge_media_core::{AudioBridge, AudioBridgeConfig, RecordingConfig, ResponseId};
use std::sync::Arc;
use temp_dir::TempDir;
use tokio::net::UdpSocket;

/// A barge-in clears the pending RTP queue but must not rewrite history:
/// the recording keeps exactly the audio that was transmitted, and the
/// discarded remainder shows up as silence, not as the queued audio.
#[tokio::test]
async fn test_interruption_preserves_recorder_timeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("call.wav");

    let mut config = AudioBridgeConfig::default();
    config.recording = RecordingConfig::to_file(&path);
    let (bridge, _events) = AudioBridge::new(config, Arc::new(CodecRegistry::with_defaults()));

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    bridge.start().await.unwrap();
    bridge.set_negotiated_codec(8).unwrap();
    bridge
        .set_remote_endpoint("127.0.0.1", peer.local_addr().unwrap().port())
        .unwrap();

    // 200ms of 24kHz PCM -> 20 PCMA packets. The 5-packet burst transmits
    // 50ms; the remaining 15 packets sit queued below the pre-buffer
    // threshold, so nothing else reaches the wire before the clear.
    let id = ResponseId::from("resp");
    let queued = bridge.send_audio(&vec![1000i16; 4800], &id).unwrap();
    assert_eq!(queued, 20);

    bridge.clear_audio_buffer();
    bridge.stop().await;

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 24000);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(!samples.is_empty());
    assert_eq!(samples.len() % 960, 0, "file must end on a whole frame");

    let caller: Vec<i16> = samples.iter().step_by(2).copied().collect();
    let ai: Vec<i16> = samples.iter().skip(1).step_by(2).copied().collect();

    // No inbound audio was fed: the caller channel is a silent timeline.
    assert!(caller.iter().all(|&s| s == 0));

    // Exactly the five transmitted packets (5 x 240 samples at 24kHz) are
    // on the AI channel; the fifteen discarded packets are silence.
    let voiced: Vec<i16> = ai.iter().copied().filter(|&s| s != 0).collect();
    assert_eq!(
        voiced.len(),
        1200,
        "only transmitted audio may be recorded; the cleared queue is silence"
    );
    // 1000 through two 0.9-gain resampling passes lands at 810.
    assert!(voiced.iter().all(|&s| (780..=840).contains(&s)));
}
