//! Fractional read-head phase for the resampling engine.

use super::step::StepRatio;

/// One tick's advance: whole input frames to skip plus the interpolation
/// weights for the new fractional position. `mul + next_mul == 0x10000`.
#[derive(Debug, Clone, Copy)]
pub struct Advance {
    pub frames: u32,
    pub mul: u32,
    pub next_mul: u32,
}

/// 16.16 fixed-point phase accumulator over the input frame stream.
///
/// Only the low 16 bits of the position persist between ticks; the whole
/// part is handed to the caller as a frame advance each tick.
#[derive(Debug, Clone)]
pub struct PhaseAccum {
    step: StepRatio,
    frac: u32,
    tail: u32,
}

impl PhaseAccum {
    pub fn new(step: StepRatio) -> Self {
        Self {
            step,
            frac: 0,
            tail: 0,
        }
    }

    /// Step the phase by one output tick.
    #[inline]
    pub fn advance(&mut self) -> Advance {
        let fine = self.frac + self.step.tick(&mut self.tail);
        self.frac = fine & 0xFFFF;
        Advance {
            frames: fine >> 16,
            mul: 0x10000 - self.frac,
            next_mul: self.frac,
        }
    }
}

/// Weighted blend of two bracketing samples; exact at the endpoints.
#[inline]
pub fn lerp(s0: u16, s1: u16, adv: &Advance) -> u32 {
    (u32::from(s0) * adv.mul + u32::from(s1) * adv.next_mul) >> 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_advances_one_frame_with_zero_fraction() {
        let mut phase = PhaseAccum::new(StepRatio::UNITY);
        for _ in 0..50 {
            let adv = phase.advance();
            assert_eq!(adv.frames, 1);
            assert_eq!(adv.mul, 0x10000);
            assert_eq!(adv.next_mul, 0);
        }
    }

    #[test]
    fn test_total_advance_is_drift_free() {
        // Over one remainder period the summed whole-frame advances plus the
        // surviving fraction equal the exact rational total.
        let step = StepRatio::CLK_DIV_1024;
        let mut phase = PhaseAccum::new(step);
        let mut frames = 0u64;
        for _ in 0..step.den {
            frames += u64::from(phase.advance().frames);
        }
        let exact = u64::from(step.int) * u64::from(step.den) + u64::from(step.num);
        assert_eq!(frames * 0x10000 + u64::from(phase.frac), exact);
    }

    #[test]
    fn test_lerp_hits_endpoints_and_midpoint() {
        let ends = Advance {
            frames: 0,
            mul: 0x10000,
            next_mul: 0,
        };
        assert_eq!(lerp(100, 60000, &ends), 100);
        let mid = Advance {
            frames: 0,
            mul: 0x8000,
            next_mul: 0x8000,
        };
        assert_eq!(lerp(1000, 3000, &mid), 2000);
        // Full-scale inputs stay inside u32 and land on the second sample.
        let one = Advance {
            frames: 0,
            mul: 0,
            next_mul: 0x10000,
        };
        assert_eq!(lerp(0xFFFF, 0xFFFF, &one), 0xFFFF);
    }
}
