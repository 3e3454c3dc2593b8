//! Version, hashing, timing and the global length scale.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Library version following semantic versioning.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub revision: i32,
}

/// Returns the version of this library.
pub fn version() -> Version {
    Version {
        major: 3,
        minor: 1,
        revision: 0,
    }
}

/// Seed for [`hash`].
pub const HASH_INIT: u32 = 5381;

/// Simple djb2 hash, used to compare simulation state across runs.
pub fn hash(seed: u32, data: &[u8]) -> u32 {
    data.iter()
        .fold(seed, |h, &b| (h << 5).wrapping_add(h).wrapping_add(b as u32))
}

// f32 bits of 1.0
static LENGTH_UNITS_PER_METER: AtomicU32 = AtomicU32::new(0x3f80_0000);

/// Sets the scale used for all length based tolerances. Call this before
/// creating any world. For example, use 100 if the game works in pixels and
/// one meter is 100 pixels.
pub fn set_length_units_per_meter(length_units: f32) {
    if !(length_units.is_finite() && length_units > 0.0) {
        tracing::warn!(length_units, "ignoring invalid length units per meter");
        return;
    }
    LENGTH_UNITS_PER_METER.store(length_units.to_bits(), Ordering::Relaxed);
}

pub fn length_units_per_meter() -> f32 {
    f32::from_bits(LENGTH_UNITS_PER_METER.load(Ordering::Relaxed))
}

/// Wall clock timer used for profiling.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Nanoseconds since the timer started.
    pub fn ticks(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    pub fn milliseconds(&self) -> f32 {
        self.start.elapsed().as_secs_f32() * 1000.0
    }

    /// Returns elapsed milliseconds and restarts the timer.
    pub fn milliseconds_and_reset(&mut self) -> f32 {
        let now = Instant::now();
        let ms = (now - self.start).as_secs_f32() * 1000.0;
        self.start = now;
        ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash(HASH_INIT, &[]), HASH_INIT);
        let a = hash(HASH_INIT, b"rigid2d");
        let b = hash(HASH_INIT, b"rigid2d");
        let c = hash(HASH_INIT, b"rigid2e");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_timer_reset() {
        let mut timer = Timer::new();
        let first = timer.milliseconds_and_reset();
        assert!(first >= 0.0);
        assert!(timer.milliseconds() >= 0.0);
    }

    #[test]
    fn test_version() {
        assert_eq!(version().major, 3);
    }
}
