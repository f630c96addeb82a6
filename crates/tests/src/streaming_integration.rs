//! Integration tests for the streaming path
//!
//! Chunked processing must be indistinguishable from processing the same
//! signal as one chunk, whether driven directly, through the `Chunker`, the
//! render callback or a dedicated audio thread.

use soundstage_core::{
    frames_from_interleaved, frames_to_interleaved, Engine, EngineConfig, Environment, Frame,
    SettingsPatch,
};
use soundstage_infra::{AudioSession, Chunker, FrameFifo, RenderCallback};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 44100;

fn engine_with_chunk(chunk_frames: usize) -> Engine {
    Engine::with_config(EngineConfig {
        chunk_frames,
        ..EngineConfig::with_sample_rate(SAMPLE_RATE)
    })
    .unwrap()
}

fn busy_patch() -> SettingsPatch {
    SettingsPatch {
        bass: Some(80.0),
        treble: Some(75.0),
        surround_intensity: Some(60.0),
        surround_depth: Some(40.0),
        environment: Some("room".to_string()),
    }
}

fn test_signal(frames: usize) -> Vec<Frame> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            Frame::new(
                0.4 * (2.0 * PI * 110.0 * t).sin() + 0.2 * (2.0 * PI * 3000.0 * t).sin(),
                0.4 * (2.0 * PI * 165.0 * t).sin(),
            )
        })
        .collect()
}

fn max_delta(frames: &[Frame]) -> f32 {
    frames
        .windows(2)
        .map(|w| (w[1].left - w[0].left).abs().max((w[1].right - w[0].right).abs()))
        .fold(0.0, f32::max)
}

// ============================================================================
// CONTINUITY
// ============================================================================

#[test]
fn test_chunked_output_matches_single_chunk() {
    let input = test_signal(10_000);

    let mut whole = engine_with_chunk(1024);
    whole.update_settings(&busy_patch()).unwrap();
    let mut expected = input.clone();
    whole.process_chunk(&mut expected).unwrap();

    let mut chunked = engine_with_chunk(1024);
    chunked.update_settings(&busy_patch()).unwrap();
    let output = Chunker::new(1024)
        .unwrap()
        .process(&mut chunked, &input)
        .unwrap();

    assert_eq!(output, expected);
}

#[test]
fn test_seams_are_no_rougher_than_chunk_interiors() {
    let chunk = 512;
    let input = test_signal(chunk * 16);

    let mut engine = engine_with_chunk(chunk);
    engine.update_settings(&busy_patch()).unwrap();
    let mut output = input.clone();
    for block in output.chunks_mut(chunk) {
        engine.process_chunk(block).unwrap();
    }

    let interior = output
        .chunks(chunk)
        .map(max_delta)
        .fold(0.0, f32::max);
    for seam in (chunk..output.len()).step_by(chunk) {
        let delta = max_delta(&output[seam - 1..=seam]);
        assert!(
            delta <= interior * 1.1,
            "seam at {} jumps {} (interior max {})",
            seam,
            delta,
            interior
        );
    }
}

#[test]
fn test_interleaved_and_planar_match_frames() {
    let input = test_signal(2048);

    let mut framed = engine_with_chunk(256);
    framed.update_settings(&busy_patch()).unwrap();
    let mut expected = input.clone();
    for block in expected.chunks_mut(256) {
        framed.process_chunk(block).unwrap();
    }

    let mut interleaved_engine = engine_with_chunk(256);
    interleaved_engine.update_settings(&busy_patch()).unwrap();
    let mut interleaved = frames_to_interleaved(&input);
    for block in interleaved.chunks_mut(512) {
        interleaved_engine.process_interleaved(block).unwrap();
    }
    assert_eq!(frames_from_interleaved(&interleaved).unwrap(), expected);

    let mut planar_engine = engine_with_chunk(256);
    planar_engine.update_settings(&busy_patch()).unwrap();
    let mut left: Vec<f32> = input.iter().map(|f| f.left).collect();
    let mut right: Vec<f32> = input.iter().map(|f| f.right).collect();
    for (l, r) in left.chunks_mut(256).zip(right.chunks_mut(256)) {
        planar_engine.process_planar(l, r).unwrap();
    }
    let planar: Vec<Frame> = left
        .iter()
        .zip(&right)
        .map(|(&l, &r)| Frame::new(l, r))
        .collect();
    assert_eq!(planar, expected);
}

#[test]
fn test_reset_restores_fresh_state() {
    let input = test_signal(4096);

    let mut fresh = engine_with_chunk(1024);
    fresh.update_settings(&busy_patch()).unwrap();
    let mut expected = input.clone();
    fresh.process_chunk(&mut expected).unwrap();

    let mut reused = engine_with_chunk(1024);
    reused.update_settings(&busy_patch()).unwrap();
    let mut warmup = test_signal(3000);
    reused.process_chunk(&mut warmup).unwrap();
    reused.reset();

    let mut output = input.clone();
    reused.process_chunk(&mut output).unwrap();
    assert_eq!(output, expected);
}

// ============================================================================
// SETTINGS
// ============================================================================

#[test]
fn test_settings_apply_from_next_chunk() {
    let input = test_signal(2048);

    let mut engine = engine_with_chunk(1024);
    let mut first = input[..1024].to_vec();
    engine.process_chunk(&mut first).unwrap();

    let update = serde_json::json!({ "低音": 90.0, "volume": 3 });
    engine
        .update_settings_map(update.as_object().unwrap())
        .unwrap();
    assert_eq!(engine.settings().bass, 90.0);

    let mut second = input[1024..].to_vec();
    engine.process_chunk(&mut second).unwrap();

    // The first chunk saw neutral settings: makeup gain only
    for (x, y) in input[..1024].iter().zip(&first) {
        assert_eq!(y.left, x.left * 1.4);
    }
    // The second chunk carries the bass boost
    let neutral: Vec<f32> = input[1024..].iter().map(|f| f.left * 1.4).collect();
    assert!(second.iter().zip(&neutral).any(|(y, &n)| (y.left - n).abs() > 1e-3));
}

// ============================================================================
// THREADS
// ============================================================================

#[test]
fn test_session_and_render_callback_match_direct_streaming() {
    let input = test_signal(6000);

    let mut direct = engine_with_chunk(256);
    direct.update_settings(&busy_patch()).unwrap();
    let expected = Chunker::new(256).unwrap().process(&mut direct, &input).unwrap();

    let session = AudioSession::start(engine_with_chunk(256)).unwrap();
    session.settings().update(&busy_patch()).unwrap();
    let threaded = session.process_all(&input).unwrap();
    session.stop().unwrap();
    assert_eq!(threaded, expected);

    // 6000 frames is not a multiple of 256; pad so the callback never underruns
    let padded_len = Chunker::new(256).unwrap().chunk_count(input.len()) * 256;
    let mut padded = input.clone();
    padded.resize(padded_len, Frame::SILENCE);

    let fifo = FrameFifo::with_capacity(padded_len);
    assert_eq!(fifo.push_frames(&padded), padded_len);
    let engine = engine_with_chunk(256);
    engine.update_settings(&busy_patch()).unwrap();
    let mut callback = RenderCallback::new(engine, fifo.clone());

    let mut rendered = vec![0.0f32; padded_len * 2];
    for buffer in rendered.chunks_mut(512) {
        callback.render(buffer).unwrap();
    }
    assert_eq!(fifo.underruns(), 0);

    let rendered = frames_from_interleaved(&rendered).unwrap();
    assert_eq!(&rendered[..input.len()], &expected[..]);
}

#[test]
fn test_environment_switch_from_control_thread() {
    let session = AudioSession::start(engine_with_chunk(512)).unwrap();
    let settings = session.settings();

    let control = std::thread::spawn(move || {
        settings
            .update(&SettingsPatch {
                environment: Some("教堂".to_string()),
                ..SettingsPatch::default()
            })
            .unwrap()
    });
    let applied = control.join().unwrap();
    assert_eq!(applied.environment, Environment::Church);

    let mut impulse = vec![Frame::SILENCE; 512 * 8];
    impulse[0] = Frame::mono(0.5);
    let output = session.process_all(&impulse).unwrap();
    let engine = session.stop().unwrap();

    assert_eq!(engine.settings().environment, Environment::Church);
    assert!(output[512..].iter().any(|f| f.left.abs() > 1e-5));
}
