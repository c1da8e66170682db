//! # Delay: A VST3/CLAP Feedback Delay
//!
//! A real-time delay effect built with [nih-plug](https://github.com/robbert-vdh/nih-plug).
//! The DSP lives in [`engine::DelayEngine`], which knows nothing about
//! plugin formats; this file is the thin adapter that hands it the host's
//! configuration, audio buffers and reset requests.
//!
//! ## Threads
//!
//! ```text
//!  host automation / UI                     audio thread
//!  ────────────────────                     ────────────
//!  DelayParams callback ──► ParameterBridge ──► DelayEngine::process
//!                          (atomic slots)        (smoothers, delay lines)
//! ```
//!
//! The bridge carries every continuous control. The mix law is a discrete
//! switch, so the audio thread reads it from the parameters at the top of
//! each block. Everything else is owned by the audio thread.

pub mod bridge;
pub mod dsp;
pub mod engine;
pub mod error;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;

pub use bridge::{ParamId, ParameterBridge};
pub use engine::{ChannelLink, DelayEngine, EngineConfig, MixLaw, SmoothingConfig};
pub use error::ConfigError;
use params::DelayParams;

/// Longest delay the buffers are sized for: the 2000 ms knob maximum
/// stretched by the full +50 % spread.
const MAX_DELAY_SECONDS: f32 = 3.0;

/// The plugin instance.
///
/// Parameters are shared with the host through `Arc` and may be read from
/// any thread. The engine is owned exclusively by the audio thread. The two
/// only meet in the bridge.
struct Delay {
    params: Arc<DelayParams>,
    bridge: Arc<ParameterBridge>,
    engine: DelayEngine,
}

impl Default for Delay {
    fn default() -> Self {
        let bridge = Arc::new(ParameterBridge::new());
        Self {
            params: Arc::new(DelayParams::new(Arc::clone(&bridge))),
            // Replaced in initialize() once the channel count is known.
            engine: DelayEngine::new(EngineConfig::default(), Arc::clone(&bridge)),
            bridge,
        }
    }
}

impl Plugin for Delay {
    const NAME: &'static str = "Delay";
    const VENDOR: &'static str = "Zhijian Li";
    const URL: &'static str = "https://codeberg.org/lzj15";
    const EMAIL: &'static str = "lzj15@proton.me";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first: most DAW tracks are stereo, and hosts pick the first
    // layout that matches.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called when the plugin is loaded or the audio configuration
    /// changes. This is where the delay memory is allocated.
    ///
    /// Returning `false` tells the host this instance can't run with the
    /// given configuration and must not be activated.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);

        // Independent delay times per channel, so the Spread knob can pull
        // the channels apart. At zero spread this sounds identical to a
        // linked delay.
        let config = EngineConfig {
            num_channels,
            channel_link: ChannelLink::Independent,
            mix_law: self.params.mix_law.value().into(),
            ..EngineConfig::default()
        };

        // Values restored from a saved session may never have passed
        // through a callback, so hand the engine all of them.
        self.params.publish_all(&self.bridge);

        let mut engine = DelayEngine::new(config, Arc::clone(&self.bridge));
        match engine.configure(
            buffer_config.sample_rate,
            buffer_config.max_buffer_size as usize,
            MAX_DELAY_SECONDS,
        ) {
            Ok(()) => {
                self.engine = engine;
                true
            }
            Err(err) => {
                nih_error!("Delay cannot be activated: {err}");
                false
            }
        }
    }

    /// Called when playback stops or the transport jumps. Clears the delay
    /// lines so stale echoes don't bleed into the next playback.
    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.engine.set_mix_law(self.params.mix_law.value().into());
        self.engine.process_in_place(buffer.as_slice());

        // Keep the host calling process() after the input goes silent so
        // the repeats ring out instead of being cut off.
        ProcessStatus::Tail(self.engine.tail_samples())
    }
}

impl ClapPlugin for Delay {
    const CLAP_ID: &'static str = "org.codeberg.lzj15.delay-nih-plug";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A feedback delay with tone control and stereo spread");
    const CLAP_MANUAL_URL: Option<&'static str> = Some(Self::URL);
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for Delay {
    const VST3_CLASS_ID: [u8; 16] = *b"delay-nih-plug00";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// Entry points the host uses to discover the plugin: `clap_entry` for
// CLAP hosts, `GetPluginFactory` for VST3 hosts.
nih_export_clap!(Delay);
nih_export_vst3!(Delay);
