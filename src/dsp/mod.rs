//! # DSP Primitives
//!
//! - **`delay_line`**: a ring buffer that stores past samples and reads
//!   them back after a fractional delay.
//! - **`smoother`**: ramps control values toward their targets so parameter
//!   changes never click.
//! - **`filter`**: a one-pole lowpass that darkens the feedback path.

pub mod delay_line;
pub mod filter;
pub mod smoother;

/// Magnitude below which a sample is treated as silence.
pub const DENORMAL_THRESHOLD: f32 = 1e-20;

/// Flush tiny values to exact zero.
///
/// A feedback loop decaying toward silence eventually produces subnormal
/// floats, which are dramatically slower on many CPUs. Anything below
/// [`DENORMAL_THRESHOLD`] is inaudible, so it is replaced with 0.0.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}
