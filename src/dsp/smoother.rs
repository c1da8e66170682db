//! # Parameter Smoothing
//!
//! When a control value jumps (a knob is moved, an automation lane steps),
//! applying it instantly creates a discontinuity in the signal that sounds
//! like a click, or a burst of "zipper noise" for a continuously moving
//! knob. A smoother ramps from the old value to the new one over a short
//! window instead.
//!
//! Two styles are available:
//!
//! - **Linear**: a fixed increment per sample, reaching the target after
//!   exactly `smoothing_time * sample_rate` samples. Every step has the same
//!   size, which makes the largest per-sample change easy to bound.
//! - **Exponential**: a one-pole lowpass, `current += (target - current) * coeff`.
//!   Fast at first, then easing in. Near the target the per-sample move is
//!   floored at [`SETTLE_EPSILON`] (relative to the target's magnitude) so
//!   the ramp cannot stall on `f32` rounding, and it snaps once it is closer
//!   than that.

/// Smallest step an exponential ramp takes, and the distance below which it
/// snaps, relative to `max(1, |target|)`.
pub const SETTLE_EPSILON: f32 = 1e-6;

/// How a [`SmoothedParam`] moves toward its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmoothingStyle {
    #[default]
    Linear,
    Exponential,
}

/// A scalar control value that glides toward its target one sample at a
/// time.
///
/// Only the audio thread touches a `SmoothedParam`. New targets arrive from
/// other threads through the [`ParameterBridge`](crate::bridge::ParameterBridge)
/// and are applied at block boundaries with [`set_target`](Self::set_target).
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    style: SmoothingStyle,
    current: f32,
    target: f32,

    /// Length of a full ramp in samples, derived from the smoothing time.
    ramp_samples: u32,
    /// Linear: samples left in the current ramp.
    steps_remaining: u32,
    /// Linear: per-sample increment for the current ramp.
    step: f32,
    /// Exponential: fraction of the remaining distance covered per sample.
    coeff: f32,
}

impl SmoothedParam {
    /// A smoother resting at `initial`. Until [`configure`](Self::configure)
    /// is called the ramp length is zero, so targets apply on the next sample.
    pub fn new(style: SmoothingStyle, initial: f32) -> Self {
        Self {
            style,
            current: initial,
            target: initial,
            ramp_samples: 0,
            steps_remaining: 0,
            step: 0.0,
            coeff: 1.0,
        }
    }

    /// Recompute the per-sample increment or coefficient for a new sample
    /// rate or smoothing time.
    ///
    /// For an exponential smoother `smoothing_time_seconds` is the time
    /// constant (time to cover ~63 % of the distance). A ramp already in
    /// progress continues from the current value at the new rate.
    pub fn configure(&mut self, smoothing_time_seconds: f32, sample_rate: f32) {
        let samples = f64::from(smoothing_time_seconds.max(0.0)) * f64::from(sample_rate.max(0.0));
        self.ramp_samples = if samples.is_finite() {
            samples.round().min(f64::from(u32::MAX)) as u32
        } else {
            0
        };

        self.coeff = if self.ramp_samples <= 1 {
            1.0
        } else {
            1.0 - (-1.0 / self.ramp_samples as f32).exp()
        };

        if self.is_smoothing() {
            self.start_ramp();
        }
    }

    /// Record a new target. The current value is left untouched; it starts
    /// moving on the next call to [`next`](Self::next).
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        self.start_ramp();
    }

    /// Advance one sample toward the target and return the new value.
    ///
    /// If `next` is not called for a while, the value simply waits where it
    /// was and resumes from there.
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.style {
            SmoothingStyle::Linear => {
                if self.steps_remaining > 0 {
                    self.steps_remaining -= 1;
                    // Measured back from the target so rounding errors never
                    // accumulate, and the last step lands exactly.
                    self.current = self.target - self.step * self.steps_remaining as f32;
                }
            }
            SmoothingStyle::Exponential => {
                let diff = self.target - self.current;
                let floor = self.settle_floor();
                if diff.abs() <= floor {
                    self.current = self.target;
                } else {
                    let delta = diff * self.coeff;
                    self.current += if delta.abs() < floor {
                        floor.copysign(diff)
                    } else {
                        delta
                    };
                }
            }
        }
        self.current
    }

    /// The value most recently returned by `next` (or set by a snap).
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether `next` would still change the value.
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.current != self.target
    }

    /// Jump straight to the target. Used on reset, never mid-block.
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.steps_remaining = 0;
        self.step = 0.0;
    }

    #[inline]
    fn settle_floor(&self) -> f32 {
        SETTLE_EPSILON * self.target.abs().max(1.0)
    }

    fn start_ramp(&mut self) {
        if self.style != SmoothingStyle::Linear {
            return;
        }
        if self.ramp_samples == 0 {
            // No smoothing: the next sample lands on the target.
            self.steps_remaining = 1;
            self.step = self.target - self.current;
        } else {
            self.steps_remaining = self.ramp_samples;
            self.step = (self.target - self.current) / self.ramp_samples as f32;
        }
    }
}
