//! Precomputed drive-pattern tables.
//!
//! A drive code selects a 128-bit pin pattern whose population equals the
//! code (its "load"). The pattern is stored as four 32-bit words in
//! LSB-first bit order, emitted one word per sub-step. Two constructions
//! share the layout: a thermometer table for PWM-banded drive and a
//! shuffled table that spreads each load's ones across the window for
//! dithered drive.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::error::{EngineError, EngineResult};
use crate::engine::shaper::Quantizer;

/// Rows in a pattern table, one per load in `0..=128`.
pub const PATTERN_ROWS: usize = 129;

/// 32-bit words per row; also the sub-steps per drive tick.
pub const ROW_WORDS: usize = 4;

/// Bits per pattern row.
const ROW_BITS: usize = 128;

/// A flat `PATTERN_ROWS * ROW_WORDS` word table indexed by bank codes.
pub struct PatternTable {
    words: Box<[u32]>,
}

impl PatternTable {
    /// Thermometer rows: load `r` is `r` ones growing from the LSB.
    pub fn thermometer() -> EngineResult<Self> {
        let mut words = vec![0u32; PATTERN_ROWS * ROW_WORDS];
        for r in 0..PATTERN_ROWS {
            for w in 0..ROW_WORDS {
                let bits = r.saturating_sub(w * 32).min(32);
                words[r * ROW_WORDS + w] = if bits == 32 {
                    u32::MAX
                } else {
                    (1u32 << bits) - 1
                };
            }
        }
        let table = Self {
            words: words.into_boxed_slice(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Dithered rows: load `r`'s ones are spread over the window by
    /// shuffling a pool of `128 * r` ones in `128 * 128` slots, then
    /// drawing random 128-slot windows until one has exactly `r` ones.
    /// Deterministic for a given seed.
    pub fn dither(seed: u64) -> EngineResult<Self> {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut words = vec![0u32; PATTERN_ROWS * ROW_WORDS];
        let mut pool = vec![0u8; ROW_BITS * ROW_BITS];
        for r in 0..PATTERN_ROWS {
            for (i, slot) in pool.iter_mut().enumerate() {
                *slot = u8::from(i % ROW_BITS < r);
            }
            pool.shuffle(&mut rng);
            let window = loop {
                let start = rng.random_range(0..pool.len() - ROW_BITS);
                let window = &pool[start..start + ROW_BITS];
                if window.iter().map(|&b| u32::from(b)).sum::<u32>() == r as u32 {
                    break window;
                }
            };
            for w in 0..ROW_WORDS {
                let mut word = 0u32;
                for s in 0..32 {
                    word |= u32::from(window[w * 32 + s]) << s;
                }
                words[r * ROW_WORDS + w] = word;
            }
        }
        let table = Self {
            words: words.into_boxed_slice(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Word `j` of the row addressed by `bank`.
    #[inline]
    pub fn word(&self, bank: u16, j: usize) -> u32 {
        self.words[bank as usize + j]
    }

    /// Prove a quantizer's whole output range stays inside this table.
    pub fn check_bounds(&self, quantizer: &Quantizer) -> EngineResult<()> {
        let max_index = quantizer.max_bank() as usize + ROW_WORDS - 1;
        if max_index >= self.words.len() {
            return Err(EngineError::TableOverrun {
                max_index,
                len: self.words.len(),
            });
        }
        Ok(())
    }

    /// Reference check: every row's population must equal its load.
    fn validate(&self) -> EngineResult<()> {
        for r in 0..PATTERN_ROWS {
            let popcount: u32 = self.words[r * ROW_WORDS..(r + 1) * ROW_WORDS]
                .iter()
                .map(|w| w.count_ones())
                .sum();
            if popcount != r as u32 {
                return Err(EngineError::LoadMismatch { load: r, popcount });
            }
        }
        Ok(())
    }
}
