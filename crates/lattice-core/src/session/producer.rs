//! Link ingest on the producer core.
//!
//! Runs once per millisecond pacing tick: tops up an exact-rational word
//! budget, then moves whole bundles from the inbound link into the ring,
//! wire-decoding each word on the way. Restarts the session if the
//! consumer ever overruns the producer.

use crate::engine::StepRatio;
use crate::hw::LinkSource;
use crate::ring::FrameRing;
use crate::types::{FRAME_CHANNELS, RING_SAMPLES};
use crate::wire;

/// Words per link bundle, the unit the pacing budget counts.
pub const BUNDLE_WORDS: usize = 8;

/// Bundles per pacing tick: one 512-byte packet per source frame at
/// 44.1 kHz comes to exactly 705.6 bundles per millisecond.
pub const FEED_PACE: StepRatio = StepRatio {
    int: 705,
    num: 6,
    den: 10,
};

/// No bundle is started below this inbound level.
const LEVEL_FLOOR: usize = 3;

/// Pops covered by the level check; the remainder of the bundle waits on
/// the link refilling.
const EAGER_POPS: usize = 5;

/// Polls of an empty link before a guarded pop gives up and pops anyway.
const POP_SPIN_BUDGET: u32 = 4096;

/// Per-session ingest counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub words: u64,
    /// Ticks that began with the previous budget unmet.
    pub incomplete: u64,
    pub restarts: u64,
    /// Guarded pops that ran out of spin budget.
    pub pop_timeouts: u64,
}

/// What one pacing tick did, driving the caller's sleep cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Moved this many words (possibly zero); pace normally.
    Fed(usize),
    /// Nothing buffered yet; wait half a tick.
    Deferred,
    /// Consumer overran the producer; the write side rebased and laid a
    /// fresh lead-in. Wait half a tick.
    Restarted,
    /// Link drained and the ring is about to run dry.
    Exhausted,
}

/// Paced mover of link words into the frame ring.
#[derive(Debug, Default)]
pub struct LinkProducer {
    pace_tail: u32,
    fed_pos: u64,
    fed_target: u64,
    pub stats: FeedStats,
}

impl LinkProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one pacing tick.
    pub fn pump_tick<L: LinkSource>(&mut self, ring: &FrameRing, link: &mut L) -> FeedOutcome {
        // Checked before the overrun branch: once the link is dry and the
        // reader has caught up (or passed the writer) there is nothing
        // left to restart for.
        if link.exhausted() {
            let lead = ring.write_pos().wrapping_sub(ring.read_pos()) as i32;
            if lead < 2 * FRAME_CHANNELS as i32 {
                return FeedOutcome::Exhausted;
            }
        }
        if ring.consumer_overran() {
            ring.restart_write_side();
            self.pace_tail = 0;
            self.fed_pos = 0;
            self.fed_target = 0;
            self.stats.restarts += 1;
            return FeedOutcome::Restarted;
        }
        if ring.write_pos() == 0 {
            return FeedOutcome::Deferred;
        }

        if self.fed_pos != self.fed_target {
            self.stats.incomplete += 1;
        }
        self.fed_target +=
            u64::from(FEED_PACE.tick(&mut self.pace_tail)) * BUNDLE_WORDS as u64;

        let mut moved = 0;
        while self.fed_pos < self.fed_target {
            if link.level() <= LEVEL_FLOOR {
                break;
            }
            if ring.buffered() as usize + 2 * BUNDLE_WORDS > RING_SAMPLES {
                break;
            }
            let mut bundle = [0u32; BUNDLE_WORDS];
            for slot in bundle.iter_mut().take(EAGER_POPS) {
                *slot = wire::decode_packed(link.pop());
            }
            for slot in bundle.iter_mut().skip(EAGER_POPS) {
                let mut budget = POP_SPIN_BUDGET;
                while link.level() == 0 && budget > 0 {
                    budget -= 1;
                    std::hint::spin_loop();
                }
                if budget == 0 {
                    self.stats.pop_timeouts += 1;
                }
                *slot = wire::decode_packed(link.pop());
            }
            let pushed = ring.push_words(&bundle);
            debug_assert!(pushed, "bundle push after space check");
            self.fed_pos += BUNDLE_WORDS as u64;
            moved += BUNDLE_WORDS;
        }

        self.stats.ticks += 1;
        self.stats.words += moved as u64;
        FeedOutcome::Fed(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::MemoryLink;
    use crate::types::{LAG_FRAMES, LAG_SAMPLES, SILENT_FRAME};

    fn prefilled_ring() -> FrameRing {
        let ring = FrameRing::new();
        for _ in 0..LAG_FRAMES {
            assert!(ring.push_frame(&SILENT_FRAME));
        }
        ring
    }

    fn encoded_word(payload: [u8; 4]) -> u32 {
        u32::from_le_bytes(payload.map(wire::encode))
    }

    #[test]
    fn test_tick_moves_bundles_and_decodes() {
        let ring = prefilled_ring();
        // Two bundles of 0x7F payload bytes, which the escape moves to 0x80
        // on the wire.
        let words = vec![encoded_word([0x7F, 0x00, 0x01, 0x00]); 2 * BUNDLE_WORDS];
        assert_eq!(words[0], 0x0001_0080);
        let mut link = MemoryLink::new(words);
        let mut producer = LinkProducer::new();

        let outcome = producer.pump_tick(&ring, &mut link);
        assert_eq!(outcome, FeedOutcome::Fed(2 * BUNDLE_WORDS));
        assert_eq!(ring.write_pos(), LAG_SAMPLES as u32 + 32);
        // First ingested samples, past the lead-in: 0x007F then 0x0001.
        let frame = ring.frame_at(LAG_SAMPLES as u32);
        assert_eq!(frame[0], 0x007F);
        assert_eq!(frame[1], 0x0001);
        assert_eq!(producer.stats.words, 16);
    }

    #[test]
    fn test_budget_deficit_counts_incomplete() {
        let ring = prefilled_ring();
        // More than one tick's budget on the link; the ring caps the move.
        let capacity_words = (RING_SAMPLES - LAG_SAMPLES) / 2;
        let mut link =
            MemoryLink::new(std::iter::repeat(encoded_word([0; 4])).take(8 * capacity_words));
        let mut producer = LinkProducer::new();

        match producer.pump_tick(&ring, &mut link) {
            FeedOutcome::Fed(moved) => assert_eq!(moved, capacity_words),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(producer.stats.incomplete, 0);
        // Ring still full next tick: the deficit is noticed exactly once
        // per tick.
        assert_eq!(producer.pump_tick(&ring, &mut link), FeedOutcome::Fed(0));
        assert_eq!(producer.stats.incomplete, 1);
    }

    #[test]
    fn test_empty_ring_defers() {
        let ring = FrameRing::new();
        let mut link = MemoryLink::new([encoded_word([0; 4]); 8]);
        let mut producer = LinkProducer::new();
        assert_eq!(producer.pump_tick(&ring, &mut link), FeedOutcome::Deferred);
        assert_eq!(producer.stats.ticks, 0);
    }

    #[test]
    fn test_consumer_overrun_restarts_session() {
        let ring = prefilled_ring();
        ring.commit_read(ring.write_pos() + 16);
        let mut link = MemoryLink::new([encoded_word([0; 4]); 8]);
        let mut producer = LinkProducer::new();

        assert_eq!(
            producer.pump_tick(&ring, &mut link),
            FeedOutcome::Restarted
        );
        assert_eq!(producer.stats.restarts, 1);
        // The reader's counter is left alone; the write side rebases one
        // frame ahead of it and lays a fresh lead-in.
        let rp = ring.read_pos();
        assert_eq!(rp, LAG_SAMPLES as u32 + 16);
        assert_eq!(ring.write_pos(), rp + 16 + LAG_SAMPLES as u32);
        assert_eq!(ring.frame_at(rp + 16), SILENT_FRAME);
        // Feeding resumes on the very next tick.
        match producer.pump_tick(&ring, &mut link) {
            FeedOutcome::Fed(moved) => assert_eq!(moved, BUNDLE_WORDS),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_overrun_on_drained_link_ends_the_session() {
        let ring = prefilled_ring();
        ring.commit_read(ring.write_pos() + 16);
        let mut link = MemoryLink::new([]);
        let mut producer = LinkProducer::new();

        assert_eq!(
            producer.pump_tick(&ring, &mut link),
            FeedOutcome::Exhausted
        );
        assert_eq!(producer.stats.restarts, 0);
    }

    #[test]
    fn test_drained_link_reports_exhausted_near_catch_up() {
        let ring = prefilled_ring();
        let mut link = MemoryLink::new(vec![encoded_word([0; 4]); BUNDLE_WORDS]);
        let mut producer = LinkProducer::new();

        match producer.pump_tick(&ring, &mut link) {
            FeedOutcome::Fed(moved) => assert_eq!(moved, BUNDLE_WORDS),
            other => panic!("unexpected outcome {:?}", other),
        }
        // Link is empty but the ring still has the lead-in: keep feeding.
        assert_eq!(producer.pump_tick(&ring, &mut link), FeedOutcome::Fed(0));

        // Drain the ring to under two frames; now the tick reports done.
        ring.commit_read(ring.write_pos() - 16);
        assert_eq!(
            producer.pump_tick(&ring, &mut link),
            FeedOutcome::Exhausted
        );
    }
}
