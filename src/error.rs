//! # Configuration Errors
//!
//! The sample loop cannot fail: every out-of-range control value is
//! clamped. The only faults happen when the engine is (re)configured for a
//! new sample rate or maximum delay time, and they are reported here so the
//! host adapter can refuse to activate the instance.

use std::collections::TryReserveError;

use thiserror::Error;

/// Why [`DelayEngine::configure`](crate::engine::DelayEngine::configure)
/// refused to bring the engine into a ready state.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rate must be a positive, finite number of Hz (got {0})")]
    InvalidSampleRate(f32),

    #[error("maximum block size must be at least one sample")]
    InvalidBlockSize,

    #[error("maximum delay time must be a positive, finite number of seconds (got {0})")]
    InvalidMaxDelay(f32),

    #[error("the engine needs at least one audio channel")]
    NoChannels,

    /// `max_delay_seconds * sample_rate` does not fit in a buffer index.
    #[error("a {seconds} s delay line at {sample_rate} Hz cannot be addressed")]
    CapacityOverflow { seconds: f32, sample_rate: f32 },

    #[error("could not allocate a delay line of {samples} samples")]
    Allocation {
        samples: usize,
        #[source]
        source: TryReserveError,
    },
}
