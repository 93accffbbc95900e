//! Resampling, noise shaping, and drive-word emission.

pub mod consumer;
pub mod pattern;
pub mod phase;
pub mod shaper;
pub mod step;

pub use consumer::{DriveEngine, EngineStats, NUM_SINKS, RAW_SINKS};
pub use pattern::{PatternTable, PATTERN_ROWS, ROW_WORDS};
pub use phase::{lerp, Advance, PhaseAccum};
pub use shaper::Quantizer;
pub use step::StepRatio;

use crate::error::EngineResult;

/// How quantized codes become output words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// Forward prebuilt words from the ring, no shaping.
    Raw,
    /// Full-resolution delta-sigma drive through the dithered table.
    SdDither,
    /// 3-bit PWM-banded drive through the thermometer table.
    SdPwm,
}

impl DriveMode {
    /// Quantizer for this mode; raw mode has none.
    pub fn quantizer(&self) -> Option<Quantizer> {
        match self {
            DriveMode::Raw => None,
            DriveMode::SdDither => Some(Quantizer::FULL_RES),
            DriveMode::SdPwm => Some(Quantizer::PWM3),
        }
    }

    /// Build and bounds-check this mode's pattern table.
    pub fn build_table(&self, dither_seed: u64) -> EngineResult<Option<PatternTable>> {
        let (table, quantizer) = match self {
            DriveMode::Raw => return Ok(None),
            DriveMode::SdDither => (PatternTable::dither(dither_seed)?, Quantizer::FULL_RES),
            DriveMode::SdPwm => (PatternTable::thermometer()?, Quantizer::PWM3),
        };
        table.check_bounds(&quantizer)?;
        Ok(Some(table))
    }
}
