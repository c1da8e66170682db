//! # Plugin Parameters
//!
//! The knobs the host sees. Each parameter has a stable string ID (never
//! change these once published, or saved sessions and presets break), a
//! display name, a range and a default. nih-plug persists and automates
//! them; the engine never reads them directly.
//!
//! Instead every continuous parameter carries a value-change callback that
//! publishes its physical value into the [`ParameterBridge`]. The callbacks
//! only do atomic stores, so it doesn't matter which thread the host changes
//! a value from. Smoothing happens in the engine, not here. The mix law is
//! a plain switch that the plugin reads directly.

use std::sync::Arc;

use nih_plug::prelude::*;

use crate::bridge::{ParamId, ParameterBridge};
use crate::dsp::filter::OPEN_CUTOFF_HZ;
use crate::engine::MixLaw;

/// Host-facing parameters for the delay.
#[derive(Params)]
pub struct DelayParams {
    /// Time between the dry signal and the first repeat, in milliseconds.
    ///
    /// Skewed so that roughly half the knob travel covers 1-500 ms, where
    /// small changes are easiest to hear.
    #[id = "delay"]
    pub delay_time: FloatParam,

    /// How much of the delayed signal is fed back into the line. Capped
    /// below 100 % so the repeats always die out.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// Dry/wet balance: 0 % is only the input, 100 % only the repeats.
    #[id = "mix"]
    pub mix: FloatParam,

    /// Lowpass cutoff on the feedback path. Lower values give darker,
    /// tape-like repeats; fully open leaves them untouched.
    #[id = "filt"]
    pub tone: FloatParam,

    /// Stretches the delay time of each further channel, up to +50 % on
    /// the last one.
    #[id = "sprd"]
    pub spread: FloatParam,

    /// How the mix knob blends dry and wet. Read by the plugin on every
    /// block rather than published through the bridge.
    #[id = "law"]
    pub mix_law: EnumParam<MixLawParam>,
}

/// Host-facing choice of [`MixLaw`].
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixLawParam {
    #[name = "Linear"]
    Linear,
    #[name = "Equal Power"]
    EqualPower,
}

impl From<MixLawParam> for MixLaw {
    fn from(param: MixLawParam) -> Self {
        match param {
            MixLawParam::Linear => MixLaw::Linear,
            MixLawParam::EqualPower => MixLaw::EqualPower,
        }
    }
}

/// Milliseconds on the host side, seconds in the engine.
const MS_PER_SECOND: f32 = 1000.0;

impl DelayParams {
    pub fn new(bridge: Arc<ParameterBridge>) -> Self {
        Self {
            delay_time: FloatParam::new(
                "Delay Time",
                ParamId::DelayTime.default_value() * MS_PER_SECOND,
                FloatRange::Skewed {
                    min: 1.0,
                    max: 2000.0,
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1)
            .with_callback(publisher(&bridge, ParamId::DelayTime, MS_PER_SECOND)),

            feedback: FloatParam::new(
                "Feedback",
                ParamId::Feedback.default_value(),
                FloatRange::Linear { min: 0.0, max: 0.95 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage())
            .with_callback(publisher(&bridge, ParamId::Feedback, 1.0)),

            mix: FloatParam::new(
                "Mix",
                ParamId::Mix.default_value(),
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage())
            .with_callback(publisher(&bridge, ParamId::Mix, 1.0)),

            tone: FloatParam::new(
                "Tone",
                ParamId::Tone.default_value(),
                FloatRange::Skewed {
                    min: 200.0,
                    max: OPEN_CUTOFF_HZ,
                    // Frequency perception is roughly logarithmic.
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_step_size(1.0)
            .with_value_to_string(Arc::new(|value: f32| {
                if value >= OPEN_CUTOFF_HZ {
                    String::from("Open")
                } else {
                    format!("{value:.0} Hz")
                }
            }))
            .with_string_to_value(formatters::s2v_f32_hz_then_khz())
            .with_callback(publisher(&bridge, ParamId::Tone, 1.0)),

            spread: FloatParam::new(
                "Spread",
                ParamId::Spread.default_value(),
                FloatRange::Linear { min: 0.0, max: 0.5 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(0))
            .with_string_to_value(formatters::s2v_f32_percentage())
            .with_callback(publisher(&bridge, ParamId::Spread, 1.0)),

            mix_law: EnumParam::new("Mix Law", MixLawParam::Linear),
        }
    }

    /// Push every current value into the bridge.
    ///
    /// Value-change callbacks cover automation and UI edits; this covers
    /// everything else (a fresh instance, a restored session) before the
    /// engine is configured.
    pub fn publish_all(&self, bridge: &ParameterBridge) {
        bridge.publish(ParamId::DelayTime, self.delay_time.value() / MS_PER_SECOND);
        bridge.publish(ParamId::Feedback, self.feedback.value());
        bridge.publish(ParamId::Mix, self.mix.value());
        bridge.publish(ParamId::Tone, self.tone.value());
        bridge.publish(ParamId::Spread, self.spread.value());
    }
}

/// A value-change callback that forwards `value / divisor` to `id`'s slot.
fn publisher(
    bridge: &Arc<ParameterBridge>,
    id: ParamId,
    divisor: f32,
) -> Arc<dyn Fn(f32) + Send + Sync> {
    let bridge = Arc::clone(bridge);
    Arc::new(move |value| bridge.publish(id, value / divisor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let bridge = Arc::new(ParameterBridge::new());
        let params = DelayParams::new(Arc::clone(&bridge));

        // Scribble over the bridge, then republish from the parameters.
        for id in ParamId::ALL {
            bridge.publish(id, -1.0);
        }
        params.publish_all(&bridge);

        for id in ParamId::ALL {
            let published = bridge.latest(id);
            let expected = id.default_value();
            assert!(
                (published - expected).abs() < 1e-6,
                "{id:?}: published {published}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_ids_match_bridge_keys() {
        let bridge = Arc::new(ParameterBridge::new());
        let params = DelayParams::new(bridge);

        let ids: Vec<String> = params.param_map().into_iter().map(|(id, _, _)| id).collect();
        for id in ParamId::ALL {
            assert!(ids.iter().any(|key| key == id.key()), "missing {}", id.key());
        }
        // Everything except the mix law travels through the bridge.
        assert!(ids.iter().any(|key| key == "law"));
        assert_eq!(ids.len(), ParamId::COUNT + 1);
    }

    #[test]
    fn test_mix_law_choice_maps_to_engine_law() {
        let params = DelayParams::new(Arc::new(ParameterBridge::new()));
        assert_eq!(MixLaw::from(params.mix_law.value()), MixLaw::default());

        assert_eq!(MixLaw::from(MixLawParam::Linear), MixLaw::Linear);
        assert_eq!(MixLaw::from(MixLawParam::EqualPower), MixLaw::EqualPower);
    }
}
