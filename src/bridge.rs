//! # Parameter Bridge
//!
//! The only state shared between the control side (host automation, UI)
//! and the audio thread. Each control has one slot holding its latest
//! physical value as an `f32` bit-cast into an `AtomicU32`, plus a dirty
//! flag. Publishing is a pair of atomic stores; consuming is an atomic swap
//! and a load. Neither side blocks, locks or allocates.
//!
//! Slots are last-write-wins: publishing twice before the audio thread
//! looks only ever delivers the second value. Intermediate values are not
//! queued; the smoothers absorb the jump.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The controls the engine exposes, as a tagged enumeration instead of
/// string-keyed reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// Delay time in seconds.
    DelayTime,
    /// Feedback gain, clamped to the engine's stability limit.
    Feedback,
    /// Dry/wet blend, 0.0 = dry, 1.0 = wet.
    Mix,
    /// Tone filter cutoff in Hz on the feedback path.
    Tone,
    /// Per-channel delay-time offset in independent mode, as a fraction of
    /// the delay time (0.0..=0.5).
    Spread,
}

impl ParamId {
    pub const COUNT: usize = 5;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::DelayTime,
        ParamId::Feedback,
        ParamId::Mix,
        ParamId::Tone,
        ParamId::Spread,
    ];

    /// Position of this control's slot.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ParamId::DelayTime => 0,
            ParamId::Feedback => 1,
            ParamId::Mix => 2,
            ParamId::Tone => 3,
            ParamId::Spread => 4,
        }
    }

    /// Stable key, matching the host-facing parameter ID.
    pub const fn key(self) -> &'static str {
        match self {
            ParamId::DelayTime => "delay",
            ParamId::Feedback => "fdbk",
            ParamId::Mix => "mix",
            ParamId::Tone => "filt",
            ParamId::Spread => "sprd",
        }
    }

    /// The value a fresh engine starts from, in physical units.
    pub const fn default_value(self) -> f32 {
        match self {
            ParamId::DelayTime => 0.5,
            ParamId::Feedback => 0.4,
            ParamId::Mix => 0.5,
            ParamId::Tone => crate::dsp::filter::OPEN_CUTOFF_HZ,
            ParamId::Spread => 0.0,
        }
    }
}

/// An `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    #[inline]
    pub fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order);
    }
}

#[derive(Debug)]
struct Slot {
    value: AtomicF32,
    dirty: AtomicBool,
}

/// Lock-free, last-write-wins mailbox with one slot per [`ParamId`].
///
/// Shared between threads behind an `Arc`. Every slot starts dirty and
/// holding its default, so the first `consume_all` hands every control to
/// the engine.
#[derive(Debug)]
pub struct ParameterBridge {
    slots: [Slot; ParamId::COUNT],
}

impl Default for ParameterBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterBridge {
    pub fn new() -> Self {
        Self {
            slots: ParamId::ALL.map(|id| Slot {
                value: AtomicF32::new(id.default_value()),
                dirty: AtomicBool::new(true),
            }),
        }
    }

    /// Publish a new target for `id`. Non-blocking; overwrites any value
    /// the audio thread has not consumed yet.
    #[inline]
    pub fn publish(&self, id: ParamId, value: f32) {
        let slot = &self.slots[id.index()];
        slot.value.store(value, Ordering::Relaxed);
        // Release pairs with the Acquire swap in `consume_all`, so a reader
        // that sees the flag also sees the value.
        slot.dirty.store(true, Ordering::Release);
    }

    /// The latest published value for `id`, consumed or not.
    #[inline]
    pub fn latest(&self, id: ParamId) -> f32 {
        self.slots[id.index()].value.load(Ordering::Relaxed)
    }

    /// Take every value published since the last call.
    ///
    /// Called by the audio thread once per block. The iterator borrows the
    /// bridge and allocates nothing; each yielded slot is marked clean. A
    /// publish racing with the swap simply leaves the slot dirty again and
    /// is delivered (again) on the next call.
    pub fn consume_all(&self) -> impl Iterator<Item = (ParamId, f32)> + '_ {
        ParamId::ALL.into_iter().filter_map(move |id| {
            let slot = &self.slots[id.index()];
            slot.dirty
                .swap(false, Ordering::Acquire)
                .then(|| (id, slot.value.load(Ordering::Relaxed)))
        })
    }
}
