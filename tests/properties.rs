//! Property-based tests for the delay engine.
//!
//! Exercises delay accuracy, feedback decay, reset behaviour, control
//! hardening and bridge semantics using proptest for randomized inputs.

use std::f32::consts::TAU;
use std::sync::Arc;

use delay_nih_plug::{ChannelLink, DelayEngine, EngineConfig, ParamId, ParameterBridge};
use proptest::prelude::*;

const SAMPLE_RATE: f32 = 48_000.0;

fn mono_engine(max_delay_seconds: f32, settings: &[(ParamId, f32)]) -> DelayEngine {
    let bridge = Arc::new(ParameterBridge::new());
    for &(id, value) in settings {
        bridge.publish(id, value);
    }
    let mut engine = DelayEngine::new(
        EngineConfig {
            num_channels: 1,
            ..EngineConfig::default()
        },
        bridge,
    );
    engine.configure(SAMPLE_RATE, 256, max_delay_seconds).unwrap();
    engine
}

fn run(engine: &mut DelayEngine, input: &[f32]) -> Vec<f32> {
    let mut buffer = input.to_vec();
    engine.process_in_place(&mut [buffer.as_mut_slice()]);
    buffer
}

fn peak_near(signal: &[f32], center: usize, radius: usize) -> f32 {
    let start = center.saturating_sub(radius);
    let end = (center + radius + 1).min(signal.len());
    signal[start..end].iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// With no feedback and a fully wet mix, the output is the input
    /// shifted by the delay time, up to linear-interpolation error.
    #[test]
    fn output_is_input_delayed(
        delay_seconds in 0.0f32..=1.0f32,
        freq in 20.0f32..200.0f32,
    ) {
        let mut engine = mono_engine(
            1.0,
            &[
                (ParamId::DelayTime, delay_seconds),
                (ParamId::Feedback, 0.0),
                (ParamId::Mix, 1.0),
            ],
        );
        let delay_samples = (delay_seconds * SAMPLE_RATE).max(1.0);
        let len = delay_samples as usize + 1_000;

        let omega = TAU * freq / SAMPLE_RATE;
        let input: Vec<f32> = (0..len).map(|n| (omega * n as f32).sin()).collect();
        let output = run(&mut engine, &input);

        for n in (delay_samples.ceil() as usize + 1)..len {
            let expected = (omega * (n as f32 - delay_samples)).sin();
            prop_assert!(
                (output[n] - expected).abs() < 2e-3,
                "n={} delay={} got {} expected {}", n, delay_samples, output[n], expected
            );
        }
    }

    /// Echo k of an impulse has amplitude |g|^(k-1), and the repeats fall
    /// below a fixed epsilon within the number of echoes that law predicts.
    #[test]
    fn impulse_response_decays_geometrically(
        gain in prop_oneof![-0.95f32..=-0.05f32, 0.05f32..=0.95f32],
    ) {
        const DELAY: usize = 120;
        const EPSILON: f32 = 1e-4;

        let mut engine = mono_engine(
            0.1,
            &[
                (ParamId::DelayTime, DELAY as f32 / SAMPLE_RATE),
                (ParamId::Feedback, gain),
                (ParamId::Mix, 1.0),
            ],
        );

        let echoes = (EPSILON.ln() / gain.abs().ln()).ceil() as usize + 1;
        let mut input = vec![0.0; (echoes + 2) * DELAY];
        input[0] = 1.0;
        let output = run(&mut engine, &input);

        for k in 1..=echoes.min(5) {
            let expected = gain.abs().powi(k as i32 - 1);
            let actual = peak_near(&output, k * DELAY, 1);
            prop_assert!(
                (actual - expected).abs() < 1e-3,
                "echo {} with g={}: got {} expected {}", k, gain, actual, expected
            );
        }

        let late = output[(echoes + 1) * DELAY - 1..]
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        prop_assert!(late < EPSILON, "g={} still at {} after {} echoes", gain, late, echoes);
    }

    /// After a reset, a full buffer's worth of silence produces silence,
    /// no matter what was playing before.
    #[test]
    fn reset_then_silence_is_silent(
        noise in prop::collection::vec(-1.0f32..=1.0f32, 1..2_000),
        delay_seconds in 0.0f32..=0.05f32,
        feedback in -0.98f32..=0.98f32,
        mix in 0.0f32..=1.0f32,
        tone in 200.0f32..=20_000.0f32,
    ) {
        let mut engine = mono_engine(
            0.05,
            &[
                (ParamId::DelayTime, delay_seconds),
                (ParamId::Feedback, feedback),
                (ParamId::Mix, mix),
                (ParamId::Tone, tone),
            ],
        );
        run(&mut engine, &noise);

        engine.reset();
        let silence = vec![0.0; (0.05 * SAMPLE_RATE) as usize + 8];
        let output = run(&mut engine, &silence);
        prop_assert!(output.iter().all(|&v| v == 0.0));
    }

    /// Garbage control values never produce non-finite output.
    #[test]
    fn hostile_controls_keep_output_finite(
        values in prop::array::uniform5(prop_oneof![
            Just(f32::NAN),
            Just(f32::INFINITY),
            Just(f32::NEG_INFINITY),
            -1.0e6f32..1.0e6f32,
        ]),
        input in prop::collection::vec(-1.0f32..=1.0f32, 512),
    ) {
        let settings: Vec<(ParamId, f32)> = ParamId::ALL.into_iter().zip(values).collect();
        let bridge = Arc::new(ParameterBridge::new());
        let mut engine = DelayEngine::new(
            EngineConfig {
                channel_link: ChannelLink::Independent,
                ..EngineConfig::default()
            },
            Arc::clone(&bridge),
        );
        engine.configure(SAMPLE_RATE, 64, 0.01).unwrap();
        for (id, value) in settings {
            bridge.publish(id, value);
        }

        let mut left = input.clone();
        let mut right = input;
        for _ in 0..8 {
            engine.process_in_place(&mut [left.as_mut_slice(), right.as_mut_slice()]);
            prop_assert!(left.iter().chain(&right).all(|v| v.is_finite()));
        }
    }

    /// Publishing twice before the audio thread looks delivers only the
    /// second value.
    #[test]
    fn bridge_is_last_write_wins(
        id_index in 0usize..ParamId::COUNT,
        first in any::<f32>().prop_filter("comparable", |v| !v.is_nan()),
        second in any::<f32>().prop_filter("comparable", |v| !v.is_nan()),
    ) {
        let id = ParamId::ALL[id_index];
        let bridge = ParameterBridge::new();
        bridge.consume_all().for_each(drop);

        bridge.publish(id, first);
        bridge.publish(id, second);

        let seen: Vec<(ParamId, f32)> = bridge.consume_all().collect();
        prop_assert_eq!(seen, vec![(id, second)]);
        prop_assert_eq!(bridge.consume_all().count(), 0);
    }
}
