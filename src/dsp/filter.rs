//! # Tone Filter (One-Pole Lowpass)
//!
//! Applied to the delayed signal before it is fed back, so every pass
//! through the loop loses a little more top end. The first repeat is
//! filtered once, the second twice, and so on: repeats get progressively
//! darker, the way tape and bucket-brigade delays behave.
//!
//! ```text
//! y[n] = (1 - a) * x[n] + a * y[n-1]
//! a    = e^(-2π * cutoff_hz / sample_rate)
//! ```
//!
//! At [`OPEN_CUTOFF_HZ`] and above the coefficient is exactly zero and the
//! filter passes its input through untouched, so a fully open tone control
//! leaves the feedback loop bit-exact.

use std::f32::consts::PI;

use super::flush_denormal;

/// Cutoff at which the tone control is considered fully open.
pub const OPEN_CUTOFF_HZ: f32 = 20_000.0;

/// Lowest cutoff honoured. Below this the coefficient gets so close to 1.0
/// that the filter barely moves.
pub const MIN_CUTOFF_HZ: f32 = 20.0;

/// A one-pole (6 dB/octave) lowpass filter.
#[derive(Debug, Clone, Default)]
pub struct OnePoleFilter {
    /// 0.0 passes the input through; values near 1.0 filter heavily.
    coefficient: f32,

    /// The previous output sample, the filter's only state.
    prev_output: f32,
}

impl OnePoleFilter {
    /// A filter that starts out transparent.
    pub fn new() -> Self {
        Self::default()
    }

    /// The coefficient for `cutoff_hz` at `sample_rate`.
    ///
    /// Computed once per sample frame by the engine and shared across
    /// channels through [`set_coefficient`](Self::set_coefficient).
    pub fn coefficient_for(cutoff_hz: f32, sample_rate: f32) -> f32 {
        if cutoff_hz.is_nan() || cutoff_hz >= OPEN_CUTOFF_HZ {
            return 0.0;
        }
        // Stay clear of Nyquist, where the mapping stops making sense.
        let safe_cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, (sample_rate * 0.49).max(MIN_CUTOFF_HZ));
        (-2.0 * PI * safe_cutoff / sample_rate).exp()
    }

    #[inline]
    pub fn set_coefficient(&mut self, coefficient: f32) {
        self.coefficient = coefficient;
    }

    /// Process one sample through the filter.
    ///
    /// The stored state is flushed to zero once it decays below
    /// [`DENORMAL_THRESHOLD`](super::DENORMAL_THRESHOLD). The returned sample
    /// is not, so an open filter stays bit-exact.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = (1.0 - self.coefficient) * input + self.coefficient * self.prev_output;
        self.prev_output = flush_denormal(output);
        output
    }

    /// Forget the previous output so stale state doesn't leak into the next
    /// playback.
    pub fn reset(&mut self) {
        self.prev_output = 0.0;
    }
}
