//! Integration tests for the decode and reconstruction path
//!
//! These tests feed complete byte streams through the frame decoder and the
//! resampling engine:
//! - Resynchronization on line noise
//! - Mixed ready and not-ready frames
//! - Voltage mapping and zoomed reconstruction of decoded samples

mod common;

use ascope_rs::analysis::{Resampler, SincKernelTable};
use ascope_rs::error::ScopeError;
use ascope_rs::protocol::{decode, encode, FrameDecoder};
use ascope_rs::types::{
    AcquisitionConfig, Interpolation, SamplingMode, TriggerMode, TriggerSlope, VoltageRange,
    ZoomState, SAMPLES_PER_CHANNEL,
};
use common::assert_float_eq;
use common::builders::{stream, FrameBuilder};
use std::io::Cursor;
use std::sync::Arc;

fn two_channel_et() -> AcquisitionConfig {
    AcquisitionConfig {
        sampling_mode: SamplingMode::EquivalentTime,
        trigger_mode: TriggerMode::Normal,
        channel_count: 2,
        trigger_slope: TriggerSlope::Falling,
        prescale: 3,
    }
}

/// Decode every frame in `bytes`, stopping at end of stream
fn decode_all(decoder: &mut FrameDecoder, bytes: Vec<u8>) -> Vec<ascope_rs::Frame> {
    let mut src = Cursor::new(bytes);
    let mut frames = Vec::new();
    loop {
        match decoder.read_frame(&mut src) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(ScopeError::Link(_)) => break,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    frames
}

#[test]
fn test_stream_with_noise_and_mixed_frames() {
    let rt = AcquisitionConfig::default();
    let et = two_channel_et();

    let mut bytes = vec![0x12, 0xff, 0x34];
    bytes.extend(stream(&[
        FrameBuilder::new(rt).not_ready(),
        FrameBuilder::new(rt).fill(|_, i| i as u8),
        FrameBuilder::new(et).not_ready(),
        FrameBuilder::new(et).fill(|c, _| if c == 0 { 10 } else { 240 }),
    ]));

    let mut decoder = FrameDecoder::new();
    let frames = decode_all(&mut decoder, bytes);

    assert_eq!(frames.len(), 4);
    assert_eq!(decoder.stats().skipped_bytes, 3);
    assert_eq!(decoder.stats().ready_frames, 2);

    assert!(!frames[0].ready && frames[0].samples.is_none());
    assert_eq!(frames[0].config, rt);

    let raw = frames[1].samples.as_ref().unwrap();
    assert_eq!(raw.channel_count(), 1);
    assert_eq!(raw.channel(0).unwrap()[SAMPLES_PER_CHANNEL - 1], 255);

    assert_eq!(frames[3].config, et);
    let raw = frames[3].samples.as_ref().unwrap();
    assert_eq!(raw.channel(0).unwrap()[17], 10);
    assert_eq!(raw.channel(1).unwrap()[17], 240);
}

#[test]
fn test_reported_config_survives_round_trip() {
    let et = two_channel_et();
    let word = encode(&et);
    assert_eq!(decode(word), et);

    let mut decoder = FrameDecoder::new();
    let frames = decode_all(&mut decoder, FrameBuilder::new(et).not_ready().bytes());
    assert_eq!(encode(&frames[0].config), word);
}

#[test]
fn test_truncated_frame_ends_with_link_error() {
    let mut bytes = FrameBuilder::new(AcquisitionConfig::default()).bytes();
    bytes.truncate(100);

    let mut decoder = FrameDecoder::new();
    let mut src = Cursor::new(bytes);
    let err = decoder.read_frame(&mut src).unwrap_err();
    assert!(matches!(err, ScopeError::Link(_)));
    assert_eq!(decoder.stats().frames, 0);
}

#[test]
fn test_decoded_samples_reconstruct() {
    let range = VoltageRange::default();
    let resampler = Resampler::new(Arc::new(SincKernelTable::build(2)));
    let frame_bytes = FrameBuilder::new(AcquisitionConfig::default())
        .fill(|_, i| if i % 2 == 0 { 0 } else { 255 })
        .bytes();

    let mut decoder = FrameDecoder::new();
    let frames = decode_all(&mut decoder, frame_bytes);
    let voltages = frames[0].samples.as_ref().unwrap().to_voltages(&range);

    // Unit zoom is the identity for both interpolations
    for interpolation in [Interpolation::Linear, Interpolation::Sinc] {
        let out = resampler.resample(&voltages, &ZoomState::new(0, interpolation));
        let ch = out.channel(0).unwrap();
        for (k, &v) in ch.iter().enumerate() {
            let expected = if k % 2 == 0 { -5.0 } else { 5.0 };
            assert_float_eq(v, expected, 1e-9);
        }
    }

    // Zoom x4 keeps the buffer length and hits the samples at phase 0
    let out = resampler.resample(&voltages, &ZoomState::new(2, Interpolation::Linear));
    let ch = out.channel(0).unwrap();
    assert_eq!(ch.len(), SAMPLES_PER_CHANNEL);
    assert_float_eq(ch[0], -5.0, 1e-9);
    assert_float_eq(ch[4], 5.0, 1e-9);
    assert_float_eq(ch[2], 0.0, 1e-9);
}
