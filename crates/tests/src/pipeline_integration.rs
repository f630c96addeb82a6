//! Integration tests for offline rendering
//!
//! These run whole signals through `Engine::process_buffer` and check the
//! end-to-end properties of the chain: bypass identity, bass response,
//! the output ceiling, determinism and the reverb tail.

use proptest::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use soundstage_core::{
    db_to_gain, frames_from_i16, Engine, EffectSettings, Environment, Frame, PipelineTuning,
};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 44100;

fn engine() -> Engine {
    Engine::new(SAMPLE_RATE).unwrap()
}

fn ceiling() -> f32 {
    db_to_gain(PipelineTuning::STUDIO.limiter_ceiling_db)
}

fn generate_sine(frequency: f32, amplitude: f32, frames: usize) -> Vec<Frame> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            Frame::mono(amplitude * (2.0 * PI * frequency * t).sin())
        })
        .collect()
}

/// Deterministic stereo noise in [-1, 1)
fn generate_noise(seed: u64, frames: usize) -> Vec<Frame> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    };
    (0..frames).map(|_| Frame::new(next(), next())).collect()
}

fn peak(frames: &[Frame]) -> f32 {
    frames.iter().map(Frame::peak).fold(0.0, f32::max)
}

fn rms(frames: &[Frame]) -> f32 {
    let sum: f32 = frames
        .iter()
        .map(|f| f.left * f.left + f.right * f.right)
        .sum();
    (sum / (2 * frames.len()) as f32).sqrt()
}

/// Energy of the left channel between `low_hz` and `high_hz`
fn band_energy(frames: &[Frame], low_hz: f32, high_hz: f32) -> f32 {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frames.len());
    let mut buffer: Vec<Complex<f32>> = frames
        .iter()
        .map(|f| Complex::new(f.left, 0.0))
        .collect();
    fft.process(&mut buffer);

    let bin_hz = SAMPLE_RATE as f32 / frames.len() as f32;
    buffer[..frames.len() / 2]
        .iter()
        .enumerate()
        .filter(|(bin, _)| {
            let hz = *bin as f32 * bin_hz;
            hz >= low_hz && hz <= high_hz
        })
        .map(|(_, c)| c.norm_sqr())
        .sum()
}

// ============================================================================
// BYPASS
// ============================================================================

#[test]
fn test_neutral_settings_apply_only_makeup_gain() {
    let engine = engine();
    let input: Vec<Frame> = generate_noise(7, 8192)
        .into_iter()
        .map(|mut f| {
            f.scale(0.5);
            f
        })
        .collect();

    let settings = EffectSettings::default();
    assert!(settings.is_neutral());
    let output = engine.process_buffer(&input, &settings).unwrap();

    let makeup = PipelineTuning::STUDIO.makeup_gain;
    for (i, (x, y)) in input.iter().zip(&output).enumerate() {
        assert_eq!(y.left, x.left * makeup, "left differs at frame {}", i);
        assert_eq!(y.right, x.right * makeup, "right differs at frame {}", i);
    }
}

#[test]
fn test_none_preset_by_name_is_neutral() {
    let settings = EffectSettings::from_preset("none").unwrap();
    assert!(settings.is_neutral());
}

// ============================================================================
// TONE
// ============================================================================

#[test]
fn test_bass_boost_increases_low_band_energy() {
    let engine = engine();
    let input = generate_sine(60.0, 0.05, SAMPLE_RATE as usize);

    let energies: Vec<f32> = [50.0, 70.0, 90.0]
        .iter()
        .map(|&bass| {
            let settings = EffectSettings {
                bass,
                ..EffectSettings::default()
            };
            let output = engine.process_buffer(&input, &settings).unwrap();
            // Skip the filter's settling time
            let tail = &output[output.len() - 32768..];
            band_energy(tail, 40.0, 80.0)
        })
        .collect();

    assert!(energies[1] > energies[0], "energies: {:?}", energies);
    assert!(energies[2] > energies[1], "energies: {:?}", energies);
}

#[test]
fn test_treble_cut_reduces_high_band_energy() {
    let engine = engine();
    let input = generate_sine(12000.0, 0.2, 32768);

    let flat = engine
        .process_buffer(&input, &EffectSettings::default())
        .unwrap();
    let cut = EffectSettings {
        treble: 10.0,
        ..EffectSettings::default()
    };
    let cut = engine.process_buffer(&input, &cut).unwrap();

    assert!(band_energy(&cut, 11000.0, 13000.0) < band_energy(&flat, 11000.0, 13000.0));
}

// ============================================================================
// CEILING
// ============================================================================

fn settings_strategy() -> impl Strategy<Value = EffectSettings> {
    (0.0f32..100.0, 0.0f32..100.0, 0.0f32..100.0, 0.0f32..100.0).prop_map(
        |(bass, treble, surround_intensity, surround_depth)| EffectSettings {
            bass,
            treble,
            surround_intensity,
            surround_depth,
            environment: Environment::None,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_offline_output_stays_under_ceiling(
        seed in any::<u64>(),
        scale in 0.1f32..20.0,
        settings in settings_strategy(),
    ) {
        let input: Vec<Frame> = generate_noise(seed, 4096)
            .into_iter()
            .map(|mut f| { f.scale(scale); f })
            .collect();

        let output = engine().process_buffer(&input, &settings).unwrap();

        let limit = ceiling() * (1.0 + 1e-6);
        prop_assert!(peak(&output) <= limit, "peak {} > {}", peak(&output), limit);
        prop_assert!(limit < 32767.0 / 32768.0);
    }

    #[test]
    fn prop_streaming_output_stays_under_ceiling(
        seed in any::<u64>(),
        scale in 0.1f32..20.0,
        settings in settings_strategy(),
    ) {
        let mut engine = engine();
        engine.replace_settings(settings);

        let mut signal: Vec<Frame> = generate_noise(seed, 4096)
            .into_iter()
            .map(|mut f| { f.scale(scale); f })
            .collect();
        for chunk in signal.chunks_mut(512) {
            engine.process_chunk(chunk).unwrap();
        }

        prop_assert!(peak(&signal) <= ceiling() * (1.0 + 1e-6));
    }
}

#[test]
fn test_full_scale_i16_input_never_wraps() {
    let engine = engine();
    let samples: Vec<i16> = (0..8192)
        .map(|i| if i % 4 < 2 { i16::MAX } else { i16::MIN })
        .collect();
    let settings = EffectSettings {
        bass: 100.0,
        treble: 100.0,
        surround_intensity: 100.0,
        surround_depth: 100.0,
        environment: Environment::None,
    };

    let output = engine.process_i16_buffer(&samples, &settings).unwrap();
    let frames = frames_from_i16(&output).unwrap();
    // One LSB of rounding on top of the ceiling
    assert!(peak(&frames) <= ceiling() + 1.0 / 32768.0);
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_fresh_engines_render_identically() {
    let input = generate_noise(42, 22050);
    let settings = EffectSettings::from_preset("电音")
        .unwrap()
        .with_environment(Environment::Church);

    let first = engine().process_buffer(&input, &settings).unwrap();
    let second = engine().process_buffer(&input, &settings).unwrap();
    assert_eq!(first, second);

    // Offline rendering does not depend on earlier calls
    let reused = engine();
    reused
        .process_buffer(&generate_noise(1, 4096), &settings)
        .unwrap();
    assert_eq!(reused.process_buffer(&input, &settings).unwrap(), first);
}

// ============================================================================
// REVERB SCENARIO
// ============================================================================

fn burst_then_silence(silence_secs: f32) -> (Vec<Frame>, usize) {
    let burst_len = SAMPLE_RATE as usize / 10;
    let silence_len = (silence_secs * SAMPLE_RATE as f32) as usize;
    let mut signal = generate_sine(440.0, 0.5, burst_len);
    signal.resize(burst_len + silence_len, Frame::SILENCE);
    (signal, burst_len)
}

fn hall_settings() -> EffectSettings {
    EffectSettings::from_preset("无")
        .unwrap()
        .with_environment(Environment::from_name("大厅").unwrap())
}

#[test]
fn test_hall_tail_fills_silence_within_ceiling() {
    let (input, burst_len) = burst_then_silence(1.0);
    let output = engine().process_buffer(&input, &hall_settings()).unwrap();

    let silence = &output[burst_len..];
    assert!(peak(silence) > 1e-4, "tail is silent");
    assert!(peak(&output) <= ceiling() * (1.0 + 1e-6));
}

#[test]
fn test_hall_tail_decays_below_minus_60_db() {
    let decay = Environment::Hall.params().decay_secs;
    let (input, burst_len) = burst_then_silence(decay * 1.3);
    let output = engine().process_buffer(&input, &hall_settings()).unwrap();

    let window = SAMPLE_RATE as usize / 40;
    let silence = &output[burst_len..];
    let early = (SAMPLE_RATE as usize / 5) / window;
    let reference = silence
        .chunks(window)
        .take(early)
        .map(rms)
        .fold(0.0, f32::max);
    assert!(reference > 0.0);

    let check_at = (decay * 1.15 * SAMPLE_RATE as f32) as usize;
    let late = rms(&silence[check_at..check_at + window]);
    assert!(
        late < reference * 1e-3,
        "late rms {} vs reference {}",
        late,
        reference
    );
}
