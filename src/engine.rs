//! # Delay Engine
//!
//! Owns one [`DelayLine`] and tone filter per channel, plus the smoothed
//! controls, and turns each input sample into one output sample:
//!
//! ```text
//! Input ──┬───────────────────────────────────────── × dry ──┐
//!         │                                                  │
//!         └──►(+)──► [Delay Line] ──┬──► [Tone] ──► × feedback
//!              ▲                    │                  │
//!              └────────────────────┼──────────────────┘
//!                                   │                        │
//!                                   └──── × wet ────────────(+)──► Output
//! ```
//!
//! The engine is constructed per plugin instance and shares nothing with
//! other instances. The only cross-thread state is the
//! [`ParameterBridge`], drained once per block. `process` and
//! `process_in_place` never allocate, lock, log or fail; out-of-range
//! control values are clamped. `configure` is the one fallible,
//! allocating entry point and must not overlap with processing.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use nih_plug::{nih_debug_assert_eq, nih_log};

use crate::bridge::{ParamId, ParameterBridge};
use crate::dsp::delay_line::{self, DelayLine};
use crate::dsp::filter::{OnePoleFilter, MIN_CUTOFF_HZ, OPEN_CUTOFF_HZ};
use crate::dsp::flush_denormal;
use crate::dsp::smoother::{SmoothedParam, SmoothingStyle};
use crate::error::ConfigError;

/// Feedback magnitude the engine never exceeds, whatever is published.
pub const DEFAULT_FEEDBACK_LIMIT: f32 = 0.98;

/// Hard ceiling on a configured feedback limit. At 1.0 the loop never decays.
pub const MAX_FEEDBACK_LIMIT: f32 = 0.999;

/// Largest accepted [`ParamId::Spread`] value.
pub const MAX_SPREAD: f32 = 0.5;

/// Whether all channels follow one delay-time control or each channel has
/// its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelLink {
    /// One delay-time smoother, advanced once per sample frame and shared
    /// by every channel. Spread is ignored.
    #[default]
    Linked,
    /// One delay-time smoother per channel. Channel `c` of `n` targets
    /// `delay_time * (1 + spread * c / (n - 1))`.
    Independent,
}

/// How the mix control blends dry and wet signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MixLaw {
    /// `dry * (1 - mix) + wet * mix`
    #[default]
    Linear,
    /// `dry * cos(mix * π/2) + wet * sin(mix * π/2)`. Keeps perceived
    /// loudness steadier through the middle of the range.
    EqualPower,
}

/// Ramp times for each smoothed control, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    pub style: SmoothingStyle,
    pub delay_time: f32,
    pub feedback: f32,
    pub mix: f32,
    pub tone: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            style: SmoothingStyle::Linear,
            // Delay time moves the read head, so it gets the longest ramp.
            delay_time: 0.050,
            feedback: 0.020,
            mix: 0.020,
            tone: 0.050,
        }
    }
}

/// Everything about an engine that is fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub num_channels: usize,
    pub channel_link: ChannelLink,
    pub smoothing: SmoothingConfig,
    pub feedback_limit: f32,
    pub mix_law: MixLaw,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_channels: 2,
            channel_link: ChannelLink::Linked,
            smoothing: SmoothingConfig::default(),
            feedback_limit: DEFAULT_FEEDBACK_LIMIT,
            mix_law: MixLaw::Linear,
        }
    }
}

/// Control values shared by every channel for one sample frame.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Only meaningful for [`ChannelLink::Linked`].
    delay_samples: f32,
    feedback: f32,
    dry: f32,
    wet: f32,
}

/// The real-time delay processor for one plugin instance.
pub struct DelayEngine {
    config: EngineConfig,
    bridge: Arc<ParameterBridge>,

    /// Set by a successful `configure`. Until then processing passes the
    /// input through untouched.
    ready: bool,
    sample_rate: f32,
    max_block_size: usize,
    max_delay_seconds: f32,

    delay_lines: Vec<DelayLine>,
    filters: Vec<OnePoleFilter>,

    /// One entry when linked, one per channel when independent. Values are
    /// in seconds.
    delay_times: Vec<SmoothedParam>,
    feedback: SmoothedParam,
    mix: SmoothedParam,
    tone: SmoothedParam,

    /// Unsmoothed delay time and spread, kept to derive per-channel targets.
    base_delay_time: f32,
    spread: f32,

    /// Cutoff the cached coefficient was computed for.
    tone_cutoff: f32,
    tone_coefficient: f32,
}

impl DelayEngine {
    /// Create an unconfigured engine reading its controls from `bridge`.
    ///
    /// No delay memory is allocated until [`configure`](Self::configure).
    pub fn new(config: EngineConfig, bridge: Arc<ParameterBridge>) -> Self {
        let config = EngineConfig {
            feedback_limit: if config.feedback_limit.is_nan() {
                DEFAULT_FEEDBACK_LIMIT
            } else {
                config.feedback_limit.abs().min(MAX_FEEDBACK_LIMIT)
            },
            ..config
        };

        let style = config.smoothing.style;
        let delay_smoothers = match config.channel_link {
            ChannelLink::Linked => 1,
            ChannelLink::Independent => config.num_channels.max(1),
        };
        let delay_time = ParamId::DelayTime.default_value();

        Self {
            config,
            bridge,
            ready: false,
            sample_rate: 0.0,
            max_block_size: 0,
            max_delay_seconds: 0.0,
            delay_lines: Vec::new(),
            filters: Vec::new(),
            delay_times: vec![SmoothedParam::new(style, delay_time); delay_smoothers],
            feedback: SmoothedParam::new(style, ParamId::Feedback.default_value()),
            mix: SmoothedParam::new(style, ParamId::Mix.default_value()),
            tone: SmoothedParam::new(style, ParamId::Tone.default_value()),
            base_delay_time: delay_time,
            spread: ParamId::Spread.default_value(),
            tone_cutoff: OPEN_CUTOFF_HZ,
            tone_coefficient: 0.0,
        }
    }

    /// Allocate delay memory for a sample rate and maximum delay time, and
    /// bring the engine into the ready state.
    ///
    /// Every delay line is reallocated and zero-filled, smoothing rates are
    /// recomputed, and the smoothers are snapped to the latest published
    /// values. Not real-time safe: the host must not be processing while
    /// this runs. On error the engine is left not ready.
    pub fn configure(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        max_delay_seconds: f32,
    ) -> Result<(), ConfigError> {
        self.ready = false;

        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(ConfigError::InvalidBlockSize);
        }
        if !max_delay_seconds.is_finite() || max_delay_seconds <= 0.0 {
            return Err(ConfigError::InvalidMaxDelay(max_delay_seconds));
        }
        if self.config.num_channels == 0 {
            return Err(ConfigError::NoChannels);
        }

        let max_delay_samples = delay_line::samples_for(max_delay_seconds, sample_rate).ok_or(
            ConfigError::CapacityOverflow {
                seconds: max_delay_seconds,
                sample_rate,
            },
        )?;
        let delay_lines = (0..self.config.num_channels)
            .map(|_| DelayLine::new(max_delay_samples))
            .collect::<Result<Vec<_>, _>>()?;

        self.delay_lines = delay_lines;
        self.filters = vec![OnePoleFilter::new(); self.config.num_channels];
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.max_delay_seconds = max_delay_seconds;

        let smoothing = self.config.smoothing;
        for smoother in &mut self.delay_times {
            smoother.configure(smoothing.delay_time, sample_rate);
        }
        self.feedback.configure(smoothing.feedback, sample_rate);
        self.mix.configure(smoothing.mix, sample_rate);
        self.tone.configure(smoothing.tone, sample_rate);

        // Start from wherever the controls are now instead of ramping in
        // from the defaults. Dirty flags stay set; re-applying them on the
        // first block is a no-op.
        for id in ParamId::ALL {
            self.apply_target(id, self.bridge.latest(id));
        }
        self.snap_smoothers();
        self.update_tone_coefficient(self.tone.value());

        nih_debug_assert_eq!(self.delay_lines.len(), self.filters.len());
        nih_log!(
            "delay engine configured: {} channel(s) at {} Hz, {} samples per line",
            self.config.num_channels,
            sample_rate,
            self.delay_lines[0].capacity()
        );

        self.ready = true;
        Ok(())
    }

    /// Silence every delay line and filter and snap the controls to their
    /// latest targets.
    ///
    /// Used on transport discontinuities. Allocation-free, but it rewrites
    /// the whole delay memory, so it must run at a block boundary with no
    /// processing in flight.
    pub fn reset(&mut self) {
        for line in &mut self.delay_lines {
            line.clear();
        }
        for filter in &mut self.filters {
            filter.reset();
        }
        self.pull_targets();
        self.snap_smoothers();
        self.update_tone_coefficient(self.tone.value());
    }

    /// Process `num_samples` samples from `inputs` into `outputs`.
    ///
    /// Channels are matched by index. Output channels without a matching
    /// input are silenced, and the sample count is limited to the shortest
    /// buffer involved.
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], num_samples: usize) {
        let paired = inputs.len().min(outputs.len());
        let num_samples = inputs[..paired]
            .iter()
            .map(|channel| channel.len())
            .chain(outputs.iter().map(|channel| channel.len()))
            .fold(num_samples, usize::min);

        for (output, input) in outputs.iter_mut().zip(inputs) {
            output[..num_samples].copy_from_slice(&input[..num_samples]);
        }
        for output in &mut outputs[paired..] {
            output[..num_samples].fill(0.0);
        }

        self.run(&mut outputs[..paired], num_samples);
    }

    /// Process audio in place: each channel slice holds the input on entry
    /// and the output on return.
    pub fn process_in_place(&mut self, channels: &mut [&mut [f32]]) {
        let num_samples = channels
            .iter()
            .map(|channel| channel.len())
            .min()
            .unwrap_or(0);
        self.run(channels, num_samples);
    }

    /// How many samples of tail the host should keep calling `process` for
    /// after the input goes silent, i.e. until the repeats have decayed
    /// below -60 dB.
    ///
    /// Each repeat is scaled by the feedback gain, so after N repeats the
    /// level is `feedback^N`. Solving `feedback^N = 0.001`:
    ///
    /// ```text
    /// N = log10(0.001) / log10(feedback) = -3 / log10(feedback)
    /// ```
    pub fn tail_samples(&self) -> u32 {
        let delay_seconds = self
            .delay_times
            .iter()
            .map(SmoothedParam::target)
            .fold(0.0, f32::max);
        let delay_samples = delay_seconds * self.sample_rate;
        let feedback = self.feedback.target().abs();

        if feedback > 0.001 {
            let repeats = -3.0 / feedback.log10();
            (repeats.ceil() * delay_samples) as u32
        } else {
            // A single echo.
            delay_samples as u32
        }
    }

    /// Switch how dry and wet are blended. Takes effect on the next sample
    /// without a crossfade.
    pub fn set_mix_law(&mut self, mix_law: MixLaw) {
        self.config.mix_law = mix_law;
    }

    /// The sample loop. Splits the call into chunks of at most
    /// `max_block_size` samples and drains the bridge before each one.
    fn run(&mut self, channels: &mut [&mut [f32]], num_samples: usize) {
        if !self.ready {
            return;
        }

        // Channels the engine has no state for are left as dry input.
        let processed = channels.len().min(self.delay_lines.len());
        let channels = &mut channels[..processed];

        let mut start = 0;
        while start < num_samples {
            let end = (start + self.max_block_size).min(num_samples);
            self.pull_targets();

            for sample_idx in start..end {
                let frame = self.next_frame();
                for (channel_idx, channel) in channels.iter_mut().enumerate() {
                    let sample = &mut channel[sample_idx];
                    *sample = self.tick(channel_idx, *sample, &frame);
                }
            }
            start = end;
        }
    }

    /// Advance the shared smoothers by one sample.
    #[inline]
    fn next_frame(&mut self) -> Frame {
        let delay_samples = match self.config.channel_link {
            ChannelLink::Linked => self.delay_times[0].next() * self.sample_rate,
            ChannelLink::Independent => 0.0,
        };

        let limit = self.config.feedback_limit;
        let feedback = self.feedback.next().clamp(-limit, limit);

        let mix = self.mix.next().clamp(0.0, 1.0);
        let (dry, wet) = match self.config.mix_law {
            MixLaw::Linear => (1.0 - mix, mix),
            MixLaw::EqualPower => ((mix * FRAC_PI_2).cos(), (mix * FRAC_PI_2).sin()),
        };

        let tone = self.tone.next();
        if tone != self.tone_cutoff {
            self.update_tone_coefficient(tone);
        }

        Frame {
            delay_samples,
            feedback,
            dry,
            wet,
        }
    }

    /// One sample of one channel.
    #[inline]
    fn tick(&mut self, channel: usize, input: f32, frame: &Frame) -> f32 {
        let delay_samples = match self.config.channel_link {
            ChannelLink::Linked => frame.delay_samples,
            ChannelLink::Independent => self.delay_times[channel].next() * self.sample_rate,
        };

        let line = &mut self.delay_lines[channel];
        let filter = &mut self.filters[channel];

        // The line clamps the read position to its valid range.
        let delayed = line.read(delay_samples);

        filter.set_coefficient(self.tone_coefficient);
        let fed_back = filter.process(delayed) * frame.feedback;
        line.write(flush_denormal(input + fed_back));

        input * frame.dry + delayed * frame.wet
    }

    fn pull_targets(&mut self) {
        let bridge = Arc::clone(&self.bridge);
        for (id, value) in bridge.consume_all() {
            self.apply_target(id, value);
        }
    }

    /// Clamp a published value into range and hand it to its smoother.
    fn apply_target(&mut self, id: ParamId, value: f32) {
        let value = if value.is_nan() { id.default_value() } else { value };

        match id {
            ParamId::DelayTime => {
                self.base_delay_time = value.clamp(0.0, self.max_delay_seconds);
                self.retarget_delay_times();
            }
            ParamId::Feedback => {
                let limit = self.config.feedback_limit;
                self.feedback.set_target(value.clamp(-limit, limit));
            }
            ParamId::Mix => self.mix.set_target(value.clamp(0.0, 1.0)),
            ParamId::Tone => self
                .tone
                .set_target(value.clamp(MIN_CUTOFF_HZ, OPEN_CUTOFF_HZ)),
            ParamId::Spread => {
                self.spread = value.clamp(0.0, MAX_SPREAD);
                self.retarget_delay_times();
            }
        }
    }

    fn retarget_delay_times(&mut self) {
        let count = self.delay_times.len();
        let last = count.saturating_sub(1).max(1) as f32;

        for (channel, smoother) in self.delay_times.iter_mut().enumerate() {
            let offset = if count > 1 {
                self.spread * channel as f32 / last
            } else {
                0.0
            };
            let target = (self.base_delay_time * (1.0 + offset)).min(self.max_delay_seconds);
            smoother.set_target(target);
        }
    }

    fn snap_smoothers(&mut self) {
        for smoother in &mut self.delay_times {
            smoother.snap_to_target();
        }
        self.feedback.snap_to_target();
        self.mix.snap_to_target();
        self.tone.snap_to_target();
    }

    fn update_tone_coefficient(&mut self, cutoff: f32) {
        self.tone_cutoff = cutoff;
        self.tone_coefficient = OnePoleFilter::coefficient_for(cutoff, self.sample_rate);
    }
}
