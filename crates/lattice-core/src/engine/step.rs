//! Exact-rational per-tick increments.

/// An increment of `int + num / den` units per tick, applied with an
/// integer remainder accumulator so the long-run average is exact.
///
/// The unit depends on the site: the resampler counts 2^-16 input frames
/// per drive tick, the link feed counts bundles per pacing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRatio {
    pub int: u32,
    pub num: u32,
    pub den: u32,
}

impl StepRatio {
    /// 44.1 kHz source against the 1024-cycles-per-tick drive clock,
    /// in 2^-16 frames: 44100 * 65536 * 1024 / 420e6 = 7046 + 1346/3125.
    pub const CLK_DIV_1024: Self = Self {
        int: 7046,
        num: 1346,
        den: 3125,
    };

    /// 44.1 kHz source against the 896-cycle drive clock variant:
    /// 44100 * 65536 * 896 / 420e6 = 6165 + 1959/3125.
    pub const CLK_DIV_896: Self = Self {
        int: 6165,
        num: 1959,
        den: 3125,
    };

    /// Exactly one input frame per tick, for loopback and tests.
    pub const UNITY: Self = Self {
        int: 0x10000,
        num: 0,
        den: 1,
    };

    /// Advance `tail` by one tick and return this tick's whole increment.
    #[inline]
    pub fn tick(&self, tail: &mut u32) -> u32 {
        let mut step = self.int;
        *tail += self.num;
        if *tail >= self.den {
            *tail -= self.den;
            step += 1;
        }
        step
    }
}
