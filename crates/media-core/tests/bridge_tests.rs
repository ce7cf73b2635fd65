//! End-to-end bridge scenarios over real UDP sockets.

use sipbridge_codec_core::codecs::g711::alaw_compress;
use sipbridge_codec_core::CodecRegistry;
use sipbridge_media_core::events::{AiEvent, BridgeEvent};
use sipbridge_media_core::{AudioBridge, AudioBridgeConfig, ResponseId};
use sipbridge_rtp_core::{RtpHeader, RtpPacket};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn registry() -> Arc<CodecRegistry> {
    Arc::new(CodecRegistry::with_defaults())
}

async fn peer_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn started_bridge(
    config: AudioBridgeConfig,
    peer: &UdpSocket,
) -> (AudioBridge, UnboundedReceiver<BridgeEvent>, u16) {
    let (bridge, events) = AudioBridge::new(config, registry());
    let port = bridge.start().await.unwrap();
    bridge.set_negotiated_codec(8).unwrap();
    let peer_addr = peer.local_addr().unwrap();
    bridge
        .set_remote_endpoint("127.0.0.1", peer_addr.port())
        .unwrap();
    (bridge, events, port)
}

async fn recv_packet(peer: &UdpSocket) -> Vec<u8> {
    let mut buf = vec![0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .expect("packet within deadline")
        .unwrap();
    buf.truncate(len);
    buf
}

#[tokio::test]
async fn test_send_audio_produces_paced_rtp_packets() {
    let peer = peer_socket().await;
    let (bridge, _events, _port) = started_bridge(AudioBridgeConfig::default(), &peer).await;

    // 30ms of 24kHz PCM resamples to 240 samples at 8kHz: exactly three
    // 10ms PCMA packets, delivered by the initial burst.
    let id = ResponseId::from("resp_1");
    let queued = bridge.send_audio(&vec![1000i16; 720], &id).unwrap();
    assert_eq!(queued, 3);

    let mut headers = Vec::new();
    for _ in 0..3 {
        let datagram = recv_packet(&peer).await;
        assert_eq!(datagram.len(), 12 + 80);
        let packet = RtpPacket::parse(&datagram).unwrap();
        assert_eq!(packet.header.payload_type, 8);
        assert_eq!(packet.payload.len(), 80);
        headers.push(packet.header);
    }

    for window in headers.windows(2) {
        assert_eq!(
            window[1].sequence_number,
            window[0].sequence_number.wrapping_add(1)
        );
        assert_eq!(window[1].timestamp, window[0].timestamp.wrapping_add(80));
        assert_eq!(window[1].ssrc, window[0].ssrc);
    }
    assert!(headers[0].marker);

    assert_eq!(bridge.playing_response_id(), None); // all three sent
    bridge.stop().await;
}

#[tokio::test]
async fn test_inbound_rtp_emits_resampled_audio() {
    let peer = peer_socket().await;
    let (bridge, mut events, port) = started_bridge(AudioBridgeConfig::default(), &peer).await;

    // One 10ms PCMA packet carrying a constant 1000.
    let payload: Vec<u8> = std::iter::repeat(alaw_compress(1000)).take(80).collect();
    let header = RtpHeader::new(8, 7, 160, 0x1111_2222);
    let packet = RtpPacket::new(header, payload.into());
    peer.send_to(&packet.serialize(), ("127.0.0.1", port))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("audio event")
        .unwrap();
    match event {
        BridgeEvent::AudioReceived { pcm } => {
            // 80 samples at 8kHz -> 240 at 24kHz.
            assert_eq!(pcm.len(), 240);
            // A-law decodes 1000 to ~1008; the resampler applies 0.9 gain.
            for &s in &pcm {
                assert!((850..=960).contains(&s), "unexpected sample {s}");
            }
        }
        other => panic!("expected AudioReceived, got {other:?}"),
    }

    assert_eq!(bridge.stats().packets_received, 1);
    bridge.stop().await;
}

#[tokio::test]
async fn test_payload_type_mismatch_is_dropped() {
    let peer = peer_socket().await;
    let (bridge, mut events, port) = started_bridge(AudioBridgeConfig::default(), &peer).await;

    let header = RtpHeader::new(0, 1, 0, 42); // PCMU against negotiated PCMA
    let packet = RtpPacket::new(header, vec![0xFFu8; 80].into());
    peer.send_to(&packet.serialize(), ("127.0.0.1", port))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err(), "mismatched packet must not emit");
    assert_eq!(bridge.stats().packets_received, 0);
    assert_eq!(bridge.stats().packets_dropped, 1);
    bridge.stop().await;
}

#[tokio::test]
async fn test_rtp_inactivity_fires_exactly_once() {
    let peer = peer_socket().await;
    let mut config = AudioBridgeConfig::default();
    config.rtp_inactivity_timeout_ms = 150;
    let (bridge, mut events, port) = started_bridge(config, &peer).await;

    let payload: Vec<u8> = vec![alaw_compress(0); 80];
    let header = RtpHeader::new(8, 1, 0, 42);
    peer.send_to(
        &RtpPacket::new(header, payload.into()).serialize(),
        ("127.0.0.1", port),
    )
    .await
    .unwrap();

    // Collect events for well over two timeout periods of silence.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut timeouts = 0;
    let mut received_audio = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            BridgeEvent::RtpTimeout => timeouts += 1,
            BridgeEvent::AudioReceived { .. } => received_audio += 1,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(received_audio, 1);
    assert_eq!(timeouts, 1, "timeout must fire exactly once, not repeat");
    bridge.stop().await;
}

#[tokio::test]
async fn test_interruption_truncates_to_spoken_text() {
    let peer = peer_socket().await;
    let (bridge, mut events, _port) = started_bridge(AudioBridgeConfig::default(), &peer).await;

    let id = ResponseId::from("resp_9");
    bridge.handle_ai_event(AiEvent::ResponseCreated {
        response_id: id.clone(),
    });

    // Two text deltas, each followed by 100ms of audio (4800 PCM16 bytes at
    // 24kHz = 10 packets). Only the initial 5-packet burst (50ms) is
    // transmitted before the barge-in; pacing never starts because the
    // queue stays under the 30-packet pre-buffer threshold, so the playback
    // position is deterministic.
    let audio_100ms = vec![0u8; 4800];
    for text in ["Hello", " there"] {
        bridge.handle_ai_event(AiEvent::TextDelta {
            response_id: id.clone(),
            text: text.into(),
        });
        bridge.handle_ai_event(AiEvent::AudioDelta {
            response_id: id.clone(),
            audio: audio_100ms.clone().into(),
        });
    }

    assert_eq!(bridge.playback_position_ms(), 50);

    bridge.handle_ai_event(AiEvent::UserSpeechStarted);

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("interruption event")
        .unwrap();
    match event {
        BridgeEvent::ResponseInterrupted {
            response_id,
            played_ms,
            spoken,
            planned,
        } => {
            assert_eq!(response_id, id);
            assert_eq!(played_ms, 50);
            // 50ms falls inside the first 100ms segment, whose text index
            // at arrival covers only the first delta.
            assert_eq!(spoken, "Hello");
            assert_eq!(planned, " there");
        }
        other => panic!("expected ResponseInterrupted, got {other:?}"),
    }

    bridge.stop().await;
}

#[tokio::test]
async fn test_response_complete_after_playback() {
    let peer = peer_socket().await;
    let mut config = AudioBridgeConfig::default();
    config.initial_buffer_packets = 2;
    let (bridge, mut events, _port) = started_bridge(config, &peer).await;

    let id = ResponseId::from("resp_done");
    bridge.handle_ai_event(AiEvent::ResponseCreated {
        response_id: id.clone(),
    });
    bridge.handle_ai_event(AiEvent::TextDelta {
        response_id: id.clone(),
        text: "Goodbye".into(),
    });
    // 100ms of audio: 10 packets; 5 burst immediately, the rest paced.
    bridge.handle_ai_event(AiEvent::AudioDelta {
        response_id: id.clone(),
        audio: vec![0u8; 4800].into(),
    });
    bridge.handle_ai_event(AiEvent::ResponseDone {
        response_id: id.clone(),
    });

    let deadline = Duration::from_secs(3);
    let event = timeout(deadline, async {
        loop {
            match events.recv().await.expect("channel open") {
                BridgeEvent::ResponseComplete { response_id } => break response_id,
                _ => continue,
            }
        }
    })
    .await
    .expect("completion within deadline");
    assert_eq!(event, id);

    bridge.stop().await;
}
