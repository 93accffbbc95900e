//! Per-tick drive loop run on the consumer core.
//!
//! Each tick advances the fractional read head, shapes one 16-channel
//! frame into drive codes, and bursts pattern words into the output
//! FIFOs over [`ROW_WORDS`] sub-steps. Raw mode skips the shaping and
//! forwards prebuilt words one frame per tick.

use crate::engine::pattern::{PatternTable, ROW_WORDS};
use crate::engine::phase::{lerp, PhaseAccum};
use crate::engine::shaper::Quantizer;
use crate::engine::step::StepRatio;
use crate::hw::WordSink;
use crate::ring::FrameRing;
use crate::types::FRAME_CHANNELS;

/// Output FIFOs in shaped modes; each carries two channels.
pub const NUM_SINKS: usize = 8;

/// Output FIFOs in raw mode; each carries two prebuilt words per tick.
pub const RAW_SINKS: usize = 4;

/// Polls of a full sink before the tick is recorded late and pushed
/// through anyway.
const FULL_SPIN_BUDGET: u32 = 4096;

/// Per-session drive counters; transient faults land here, never in a
/// `Result`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    /// Bursts that found the lead sink full at least once.
    pub fifo_stalls: u64,
    /// Bursts that exhausted the spin budget and pushed regardless.
    pub late_ticks: u64,
}

/// Resampler, noise shaper, and emission state for one session.
pub struct DriveEngine {
    quantizer: Quantizer,
    phase: PhaseAccum,
    residue: [u16; FRAME_CHANNELS],
    bank: [u16; FRAME_CHANNELS],
    pub stats: EngineStats,
}

impl DriveEngine {
    /// Fresh zeroed state; built at the start of every session.
    pub fn new(step: StepRatio, quantizer: Quantizer) -> Self {
        Self {
            quantizer,
            phase: PhaseAccum::new(step),
            residue: [0; FRAME_CHANNELS],
            bank: [0; FRAME_CHANNELS],
            stats: EngineStats::default(),
        }
    }

    /// One shaped tick: interpolate, quantize with error feedback, then
    /// burst `ROW_WORDS` sub-steps of two words per sink.
    pub fn tick_shaped<S: WordSink>(
        &mut self,
        ring: &FrameRing,
        table: &PatternTable,
        sinks: &mut [S; NUM_SINKS],
    ) {
        let adv = self.phase.advance();
        // The ring owns the read position, so a producer-forced restart
        // rebases this side as well.
        let pos = ring
            .read_pos()
            .wrapping_add(adv.frames * FRAME_CHANNELS as u32);
        let (f0, f1) = ring.frame_pair(pos);
        for i in 0..FRAME_CHANNELS {
            let raw = lerp(f0[i], f1[i], &adv) + u32::from(self.residue[i]);
            let (bank, residue) = self.quantizer.split(raw);
            self.bank[i] = bank;
            self.residue[i] = residue;
        }
        ring.commit_read(pos);

        for j in 0..ROW_WORDS {
            // The FIFOs drain in lockstep; the lead sink's level stands in
            // for all of them.
            self.wait_ready(&mut sinks[0]);
            for (f, sink) in sinks.iter_mut().enumerate() {
                sink.push(table.word(self.bank[2 * f], j));
                sink.push(table.word(self.bank[2 * f + 1], j));
            }
        }
        self.stats.ticks += 1;
    }

    /// One raw tick: forward one frame as eight prebuilt words, a
    /// contiguous pair per sink.
    pub fn tick_raw<S: WordSink>(&mut self, ring: &FrameRing, sinks: &mut [S; NUM_SINKS]) {
        let pos = ring.read_pos().wrapping_add(FRAME_CHANNELS as u32);
        let f = ring.frame_at(pos);
        ring.commit_read(pos);

        self.wait_ready(&mut sinks[0]);
        for (k, sink) in sinks[..RAW_SINKS].iter_mut().enumerate() {
            sink.push(u32::from(f[4 * k]) | u32::from(f[4 * k + 1]) << 16);
            sink.push(u32::from(f[4 * k + 2]) | u32::from(f[4 * k + 3]) << 16);
        }
        self.stats.ticks += 1;
    }

    fn wait_ready<S: WordSink>(&mut self, sink: &mut S) {
        if !sink.is_full() {
            return;
        }
        self.stats.fifo_stalls += 1;
        for _ in 0..FULL_SPIN_BUDGET {
            if !sink.is_full() {
                return;
            }
            std::hint::spin_loop();
        }
        self.stats.late_ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::MemorySink;
    use crate::types::Frame;

    fn sinks() -> [MemorySink; NUM_SINKS] {
        std::array::from_fn(|_| MemorySink::new())
    }

    #[test]
    fn test_shaped_tick_emits_table_rows() {
        let ring = FrameRing::new();
        for _ in 0..4 {
            assert!(ring.push_frame(&[60000u16; FRAME_CHANNELS]));
        }
        let table = PatternTable::thermometer().unwrap();
        let mut engine = DriveEngine::new(StepRatio::UNITY, Quantizer::FULL_RES);
        let mut sinks = sinks();

        engine.tick_shaped(&ring, &table, &mut sinks);

        // 60000 >> 9 = 117: rows of 117 ones, three full words and one
        // 21-bit word, two channels per sink.
        for sink in &sinks {
            assert_eq!(sink.words.len(), 2 * ROW_WORDS);
            assert_eq!(&sink.words[..6], &[u32::MAX; 6]);
            assert_eq!(sink.words[6], (1 << 21) - 1);
            assert_eq!(sink.words[7], (1 << 21) - 1);
        }
        assert_eq!(ring.read_pos(), FRAME_CHANNELS as u32);
        assert_eq!(engine.stats.ticks, 1);
        assert_eq!(engine.stats.fifo_stalls, 0);
    }

    #[test]
    fn test_shaped_residue_feeds_next_tick() {
        let ring = FrameRing::new();
        for _ in 0..8 {
            assert!(ring.push_frame(&[60000u16; FRAME_CHANNELS]));
        }
        let table = PatternTable::thermometer().unwrap();
        let mut engine = DriveEngine::new(StepRatio::UNITY, Quantizer::FULL_RES);
        let mut sinks = sinks();

        // Tick 1: raw 60000 -> bank row 117, residue 96. The residue grows
        // by 96 per tick and crosses the 512 step on the sixth tick.
        let mut rows = Vec::new();
        for _ in 0..6 {
            engine.tick_shaped(&ring, &table, &mut sinks);
            rows.push(engine.bank[0] >> 2);
        }
        assert_eq!(rows, vec![117, 117, 117, 117, 117, 118]);
    }

    #[test]
    fn test_full_sink_counts_stall_then_late() {
        let ring = FrameRing::new();
        for _ in 0..4 {
            assert!(ring.push_frame(&[0u16; FRAME_CHANNELS]));
        }
        let table = PatternTable::thermometer().unwrap();
        let mut engine = DriveEngine::new(StepRatio::UNITY, Quantizer::FULL_RES);
        let mut sinks = sinks();

        sinks[0].full_for(3);
        engine.tick_shaped(&ring, &table, &mut sinks);
        assert_eq!(engine.stats.fifo_stalls, 1);
        assert_eq!(engine.stats.late_ticks, 0);
        // Every burst still delivered both words per sink.
        assert_eq!(sinks[0].words.len(), 2 * ROW_WORDS);

        sinks[0].full_for(FULL_SPIN_BUDGET + 8);
        engine.tick_shaped(&ring, &table, &mut sinks);
        assert_eq!(engine.stats.late_ticks, 1);
        assert_eq!(sinks[0].words.len(), 4 * ROW_WORDS);
    }

    #[test]
    fn test_raw_tick_forwards_contiguous_word_pairs() {
        let ring = FrameRing::new();
        let mut frames = [[0u16; FRAME_CHANNELS]; 3];
        for (n, frame) in frames.iter_mut().enumerate() {
            for (i, s) in frame.iter_mut().enumerate() {
                *s = (0x100 * n as u16) + i as u16;
            }
        }
        for f in &frames {
            assert!(ring.push_frame(f));
        }
        let mut engine = DriveEngine::new(StepRatio::UNITY, Quantizer::FULL_RES);
        let mut sinks = sinks();

        engine.tick_raw(&ring, &mut sinks);

        // The engine pre-advances a frame, so the first tick plays frame 1.
        let f: Frame = frames[1];
        for (k, sink) in sinks[..RAW_SINKS].iter().enumerate() {
            let lo = u32::from(f[4 * k]) | u32::from(f[4 * k + 1]) << 16;
            let hi = u32::from(f[4 * k + 2]) | u32::from(f[4 * k + 3]) << 16;
            assert_eq!(sink.words, vec![lo, hi]);
        }
        for sink in sinks[RAW_SINKS..].iter() {
            assert!(sink.words.is_empty());
        }
    }
}
