//! # Delay Line (Ring Buffer)
//!
//! A delay line stores audio samples and lets you read them back after a
//! specified time delay. Think of a circular tape loop: a write head records
//! incoming audio, and a read head plays it back from further behind on the
//! loop. The distance between the two heads is the delay time.
//!
//! In code the "tape" is a `Vec<f32>` and the write head is an index that
//! always points at the next slot to be overwritten. Per sample:
//!
//! 1. Read the delayed sample from `(write_pos - delay_in_samples)`,
//!    wrapping around to the end of the buffer if we go past the start.
//! 2. Write the new sample at `write_pos`, which advances the head by one.
//!
//! ## Linear Interpolation
//!
//! Delay time is continuously automatable, so the read position is usually
//! fractional (441.3 samples for 10.007 ms at 44.1 kHz). Snapping to whole
//! samples would make the delay time step audibly ("zipper noise"), so we
//! blend the two neighbouring samples:
//!
//! ```text
//! result = sample_a * (1 - frac) + sample_b * frac
//! ```
//!
//! ## Capacity
//!
//! Reading `d` samples back touches slots `d` and `d + 1` behind the write
//! head. Neither may be the slot at the write head itself (it holds the
//! oldest sample, about to be overwritten), so the buffer carries
//! [`INTERPOLATION_MARGIN`] extra slots beyond the longest supported delay.

use crate::error::ConfigError;

/// Slots reserved beyond the longest delay so interpolated reads never
/// touch the slot under the write head.
pub const INTERPOLATION_MARGIN: usize = 2;

/// Shortest readable delay. Anything shorter would address the slot that is
/// about to be overwritten.
pub const MIN_DELAY_SAMPLES: f32 = 1.0;

/// Number of whole samples needed to hold `seconds` of audio at
/// `sample_rate`, rounded up. `None` when the result cannot be an index.
pub fn samples_for(seconds: f32, sample_rate: f32) -> Option<usize> {
    let samples = (f64::from(seconds) * f64::from(sample_rate)).ceil();
    if samples.is_finite() && samples >= 0.0 && samples <= (usize::MAX / 2) as f64 {
        Some(samples as usize)
    } else {
        None
    }
}

/// A ring buffer that functions as an audio delay line.
///
/// The buffer is allocated once when the engine is configured, so changing
/// the delay time never allocates. Resizing is a configuration-time
/// operation and must not run concurrently with `read`/`write`.
#[derive(Debug, Clone)]
pub struct DelayLine {
    /// The circular buffer. Starts zero-filled (silence).
    buffer: Vec<f32>,

    /// Next slot to be overwritten. Advances by one on every `write`,
    /// wrapping to 0 at the end of the buffer.
    write_pos: usize,
}

impl DelayLine {
    /// Allocate a delay line able to delay by up to `max_delay_samples`.
    ///
    /// The allocation is fallible: an absurdly large request is reported as
    /// [`ConfigError::Allocation`] instead of aborting the host process.
    pub fn new(max_delay_samples: usize) -> Result<Self, ConfigError> {
        let mut line = Self {
            buffer: Vec::new(),
            write_pos: 0,
        };
        line.resize(max_delay_samples)?;
        Ok(line)
    }

    /// Reallocate the buffer for a new maximum delay and zero-fill it.
    ///
    /// Not real-time safe. On failure the existing buffer is left untouched.
    pub fn resize(&mut self, max_delay_samples: usize) -> Result<(), ConfigError> {
        let capacity = max_delay_samples
            .max(MIN_DELAY_SAMPLES as usize)
            .saturating_add(INTERPOLATION_MARGIN);

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|source| ConfigError::Allocation {
                samples: capacity,
                source,
            })?;
        buffer.resize(capacity, 0.0);

        self.buffer = buffer;
        self.write_pos = 0;
        Ok(())
    }

    /// Total number of slots, including the interpolation margin.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The longest delay, in samples, that `read` will honour.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - INTERPOLATION_MARGIN) as f32
    }

    /// Store a sample at the write head and advance the head by one.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Read the sample written `delay_samples` writes ago, interpolating
    /// linearly between neighbours for fractional delays.
    ///
    /// A delay of 1.0 returns the most recently written sample. Out of
    /// range delays (including NaN) are clamped to
    /// `[MIN_DELAY_SAMPLES, max_delay()]`, never indexed out of bounds.
    ///
    /// # Index math
    ///
    /// To read N samples behind the write head on a ring of `len` slots:
    ///
    /// ```text
    /// read_index = (write_pos + len - N) % len
    /// ```
    ///
    /// Adding `len` before subtracting keeps the `usize` from going
    /// negative.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let delay = if delay_samples.is_nan() {
            MIN_DELAY_SAMPLES
        } else {
            delay_samples.clamp(MIN_DELAY_SAMPLES, self.max_delay())
        };

        let delay_int = delay as usize;
        let delay_frac = delay - delay_int as f32;

        let len = self.buffer.len();
        // index_a is the newer sample, index_b the one before it.
        let index_a = (self.write_pos + len - delay_int) % len;
        let index_b = (self.write_pos + len - delay_int - 1) % len;

        let sample_a = self.buffer[index_a];
        let sample_b = self.buffer[index_b];

        sample_a * (1.0 - delay_frac) + sample_b * delay_frac
    }

    /// Zero the buffer and rewind the write head.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(max_delay: usize) -> DelayLine {
        DelayLine::new(max_delay).unwrap()
    }

    #[test]
    fn test_write_and_read_exact() {
        let mut dl = line(100);
        dl.write(0.75);

        // One sample back is the value we just wrote.
        let result = dl.read(1.0);
        assert!((result - 0.75).abs() < 1e-6, "Expected 0.75, got {result}");
    }

    #[test]
    fn test_interpolation() {
        let mut dl = line(100);
        dl.write(0.0);
        dl.write(1.0);

        // 1.5 samples back sits halfway between 1.0 (newest) and 0.0.
        let result = dl.read(1.5);
        assert!((result - 0.5).abs() < 1e-6, "Expected 0.5, got {result}");
    }

    #[test]
    fn test_capacity_includes_margin() {
        let dl = line(48);
        assert_eq!(dl.capacity(), 48 + INTERPOLATION_MARGIN);
        assert_eq!(dl.max_delay(), 48.0);
    }

    #[test]
    fn test_wrapping() {
        // Capacity 4: max delay 2 plus a margin of 2.
        let mut dl = line(2);
        for i in 0..6 {
            dl.write(i as f32);
        }

        assert!((dl.read(1.0) - 5.0).abs() < 1e-6);
        assert!((dl.read(2.0) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_longest_delay_is_exact() {
        let mut dl = line(10);
        for i in 1..=20 {
            dl.write(i as f32);
        }

        // 10 writes ago the value 11 went in.
        assert!((dl.read(10.0) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_delays_are_clamped() {
        let mut dl = line(10);
        for i in 1..=20 {
            dl.write(i as f32);
        }

        assert!((dl.read(0.0) - 20.0).abs() < 1e-6);
        assert!((dl.read(-5.0) - 20.0).abs() < 1e-6);
        assert!((dl.read(f32::NAN) - 20.0).abs() < 1e-6);
        assert!((dl.read(1_000.0) - 11.0).abs() < 1e-6);
        assert!((dl.read(f32::INFINITY) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear() {
        let mut dl = line(10);
        dl.write(0.5);
        dl.clear();

        let result = dl.read(1.0);
        assert!(result.abs() < 1e-6, "Expected 0.0 after clear, got {result}");
    }

    #[test]
    fn test_resize_zero_fills() {
        let mut dl = line(10);
        for _ in 0..8 {
            dl.write(1.0);
        }
        dl.resize(20).unwrap();

        assert_eq!(dl.capacity(), 20 + INTERPOLATION_MARGIN);
        for delay in [1.0, 5.0, 20.0] {
            assert_eq!(dl.read(delay), 0.0);
        }
    }

    #[test]
    fn test_impossible_allocation_is_an_error() {
        let result = DelayLine::new(usize::MAX / 2);
        assert!(matches!(result, Err(ConfigError::Allocation { .. })));
    }

    #[test]
    fn test_fifo_sequence() {
        let mut dl = line(10);
        for i in 1..=5 {
            dl.write(i as f32);
        }

        for back in 1..=5 {
            let expected = (6 - back) as f32;
            assert!((dl.read(back as f32) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_samples_for() {
        assert_eq!(samples_for(0.5, 48_000.0), Some(24_000));
        assert_eq!(samples_for(2.1, 44_100.0), Some(92_610));
        assert_eq!(samples_for(f32::INFINITY, 48_000.0), None);
        assert_eq!(samples_for(-1.0, 48_000.0), None);
    }
}
