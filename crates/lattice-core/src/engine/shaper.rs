//! First-order error-feedback quantizers.
//!
//! Interpolated 16-bit samples are split into a coarse drive code and a
//! retained low-bit residue. The residue is added back into the next
//! tick's sample, so the truncation error never accumulates into a DC
//! offset. Codes come out pre-scaled into pattern-table word indices.

/// Truncation geometry of one drive mode.
///
/// `keep_bits` low bits of each shaped sample survive as the residue;
/// the remaining high bits, shifted left by `bank_shift`, index the
/// pattern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    pub keep_bits: u32,
    pub bank_shift: u32,
}

impl Quantizer {
    /// Full-resolution dithered drive: 129 levels, table row stride 4.
    pub const FULL_RES: Self = Self {
        keep_bits: 9,
        bank_shift: 2,
    };

    /// 3-bit PWM-banded drive: 5 levels on every 16th table row, up to
    /// half duty.
    pub const PWM3: Self = Self {
        keep_bits: 14,
        bank_shift: 6,
    };

    /// Split a shaped sample (`interp + residue`, at most 17 bits) into
    /// a table index and the new residue.
    #[inline]
    pub fn split(&self, raw: u32) -> (u16, u16) {
        let bank = ((raw >> self.keep_bits) << self.bank_shift) as u16;
        let residue = (raw & ((1 << self.keep_bits) - 1)) as u16;
        (bank, residue)
    }

    /// Sample value a bank index maps back to; the quantization floor.
    #[inline]
    pub fn reconstruct(&self, bank: u16) -> u32 {
        (u32::from(bank) >> self.bank_shift) << self.keep_bits
    }

    /// Distance between adjacent representable values.
    #[inline]
    pub fn step_size(&self) -> u32 {
        1 << self.keep_bits
    }

    /// Largest bank index this quantizer can emit, for table bounds
    /// checks. The shaped sample never exceeds `0xFFFF` plus a residue.
    pub fn max_bank(&self) -> u16 {
        let raw_max = 0xFFFF + ((1u32 << self.keep_bits) - 1);
        ((raw_max >> self.keep_bits) << self.bank_shift) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_reconstruct_are_consistent() {
        for q in [Quantizer::FULL_RES, Quantizer::PWM3] {
            for raw in [0u32, 1, 0x1FF, 0x200, 0x3FFF, 0x8000, 0xFFFF] {
                let (bank, residue) = q.split(raw);
                assert_eq!(q.reconstruct(bank) + u32::from(residue), raw);
                assert!(u32::from(residue) < q.step_size());
            }
        }
    }

    #[test]
    fn test_bank_ranges() {
        // Full resolution: 129 rows of stride 4.
        assert_eq!(Quantizer::FULL_RES.split(0xFFFF).0, 127 << 2);
        assert_eq!(Quantizer::FULL_RES.max_bank(), 128 << 2);
        // PWM: 5 levels scaled to rows 0, 16, 32, 48, 64.
        assert_eq!(Quantizer::PWM3.split(0x3FFF).0, 0);
        assert_eq!(Quantizer::PWM3.split(0x4000).0, 1 << 6);
        assert_eq!(Quantizer::PWM3.max_bank(), 4 << 6);
    }

    #[test]
    fn test_error_feedback_never_leaks_dc() {
        // Shape a constant input for a long window; the cumulative gap
        // between input and reconstructed output telescopes to the final
        // residue, so it stays under one quantization step.
        for q in [Quantizer::FULL_RES, Quantizer::PWM3] {
            for input in [100u32, 5000, 60000, 0xFFFF] {
                let mut residue = 0u16;
                let mut gap = 0i64;
                for _ in 0..10_000 {
                    let raw = input + u32::from(residue);
                    let (bank, r) = q.split(raw);
                    residue = r;
                    gap += i64::from(input) - i64::from(q.reconstruct(bank));
                    assert!(gap.unsigned_abs() < u64::from(q.step_size()));
                }
            }
        }
    }

    #[test]
    fn test_average_output_converges_to_input() {
        let q = Quantizer::FULL_RES;
        let input = 60000u32;
        let mut residue = 0u16;
        let mut sum = 0u64;
        let n = 1 << 12;
        for _ in 0..n {
            let raw = input + u32::from(residue);
            let (bank, r) = q.split(raw);
            residue = r;
            sum += u64::from(q.reconstruct(bank));
        }
        let avg = sum / n;
        assert!(avg.abs_diff(u64::from(input)) <= 1);
    }
}
