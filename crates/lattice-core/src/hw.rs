//! Hardware collaborator seams.
//!
//! The real deployments hand words to output state machines and pull them
//! from a serial bus slave. The core only needs the narrow operations
//! below; the in-memory implementations back the loopback tool and the
//! tests, where fullness and starvation are injected rather than real.

use std::collections::VecDeque;
use std::time::Instant;

/// An output FIFO that accepts prebuilt 32-bit drive words.
pub trait WordSink {
    /// Clear the FIFO and any device state behind it.
    fn reset(&mut self);
    /// Whether a push right now would overrun the FIFO.
    fn is_full(&mut self) -> bool;
    /// Write one word. Pushing while full loses the word.
    fn push(&mut self, word: u32);
}

/// An inbound link FIFO delivering received 32-bit words.
pub trait LinkSource {
    /// Words currently waiting.
    fn level(&mut self) -> usize;
    /// Pop the next word; popping while empty yields 0 and is counted
    /// by the implementation.
    fn pop(&mut self) -> u32;
    /// True once the link has delivered everything it ever will.
    fn exhausted(&mut self) -> bool;
}

/// In-memory sink that records every accepted word.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub words: Vec<u32>,
    /// Remaining `is_full` polls that report full.
    full_polls: u32,
    pub resets: u32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report full for the next `polls` calls to `is_full`.
    pub fn full_for(&mut self, polls: u32) {
        self.full_polls = polls;
    }
}

impl WordSink for MemorySink {
    fn reset(&mut self) {
        self.words.clear();
        self.resets += 1;
    }

    fn is_full(&mut self) -> bool {
        if self.full_polls > 0 {
            self.full_polls -= 1;
            true
        } else {
            false
        }
    }

    fn push(&mut self, word: u32) {
        self.words.push(word);
    }
}

/// In-memory sink that drains at a fixed word rate, like a FIFO emptied
/// by a hardware clock. Accepted words are not kept; offline runs read
/// the counters instead.
#[derive(Debug)]
pub struct ClockedSink {
    rate: u64,
    depth: u64,
    started: Instant,
    /// Words accepted so far.
    pub pushed: u64,
    /// Set bits accumulated over every accepted word.
    pub ones: u64,
}

impl ClockedSink {
    /// Sink draining `rate` words per second through a `depth`-word FIFO.
    /// A zero rate never drains and pins the sink full at `depth`.
    pub fn new(rate: u64, depth: u64) -> Self {
        Self {
            rate,
            depth,
            started: Instant::now(),
            pushed: 0,
            ones: 0,
        }
    }

    fn drained(&self) -> u64 {
        let ns = self.started.elapsed().as_nanos();
        u64::try_from(ns * u128::from(self.rate) / 1_000_000_000).unwrap_or(u64::MAX)
    }
}

impl WordSink for ClockedSink {
    fn reset(&mut self) {
        self.pushed = 0;
        self.ones = 0;
        self.started = Instant::now();
    }

    fn is_full(&mut self) -> bool {
        self.pushed.saturating_sub(self.drained()) >= self.depth
    }

    fn push(&mut self, word: u32) {
        self.pushed += 1;
        self.ones += u64::from(word.count_ones());
    }
}

/// In-memory link preloaded with a finite word stream.
#[derive(Debug, Default)]
pub struct MemoryLink {
    queue: VecDeque<u32>,
    pub underflows: u64,
}

impl MemoryLink {
    pub fn new(words: impl IntoIterator<Item = u32>) -> Self {
        Self {
            queue: words.into_iter().collect(),
            underflows: 0,
        }
    }
}

impl LinkSource for MemoryLink {
    fn level(&mut self) -> usize {
        self.queue.len()
    }

    fn pop(&mut self) -> u32 {
        match self.queue.pop_front() {
            Some(w) => w,
            None => {
                self.underflows += 1;
                0
            }
        }
    }

    fn exhausted(&mut self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_becomes_ready_after_injected_polls() {
        let mut sink = MemorySink::new();
        sink.full_for(3);
        assert!(sink.is_full());
        assert!(sink.is_full());
        assert!(sink.is_full());
        assert!(!sink.is_full());
        sink.push(0xAA55);
        assert_eq!(sink.words, vec![0xAA55]);
    }

    #[test]
    fn test_clocked_sink_fills_at_depth() {
        // A stopped drain clock: fullness is purely the push count.
        let mut sink = ClockedSink::new(0, 4);
        for _ in 0..3 {
            assert!(!sink.is_full());
            sink.push(u32::MAX);
        }
        sink.push(0);
        assert!(sink.is_full());
        assert_eq!(sink.pushed, 4);
        assert_eq!(sink.ones, 96);
    }

    #[test]
    fn test_clocked_sink_fast_clock_never_fills() {
        let mut sink = ClockedSink::new(u64::MAX, 1);
        for _ in 0..100 {
            sink.push(0xA5A5_A5A5);
        }
        assert!(!sink.is_full());
        assert_eq!(sink.pushed, 100);
    }

    #[test]
    fn test_clocked_sink_reset_clears_counters() {
        let mut sink = ClockedSink::new(0, 2);
        sink.push(0xFF);
        sink.push(0xFF);
        assert!(sink.is_full());
        sink.reset();
        assert!(!sink.is_full());
        assert_eq!(sink.pushed, 0);
        assert_eq!(sink.ones, 0);
    }

    #[test]
    fn test_link_counts_underflow_pops() {
        let mut link = MemoryLink::new([1, 2]);
        assert_eq!(link.level(), 2);
        assert!(!link.exhausted());
        assert_eq!(link.pop(), 1);
        assert_eq!(link.pop(), 2);
        assert!(link.exhausted());
        assert_eq!(link.pop(), 0);
        assert_eq!(link.underflows, 1);
    }
}
