//! Lock-free frame ring shared between the link feed and the drive engine.
//!
//! Positions are monotonically increasing sample counts; the buffer index is
//! the position masked by the ring size. The first [`LAG_SAMPLES`] of the
//! ring are mirrored past its end, so a reader that starts inside the ring
//! can always take a contiguous frame pair without a wrap branch.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{Frame, FRAME_CHANNELS, LAG_FRAMES, LAG_SAMPLES, RING_SAMPLES, SILENT_FRAME};

/// Single-producer single-consumer ring of interleaved channel frames.
///
/// The producer owns `write_pos`, the consumer owns `read_pos`; each side
/// only loads the other's counter. Sample storage is written by the
/// producer alone, in regions the position protocol keeps disjoint from
/// concurrent reads.
pub struct FrameRing {
    /// `RING_SAMPLES` of storage plus a `LAG_SAMPLES` mirror of the head.
    samples: UnsafeCell<Box<[u16]>>,
    /// Next sample position to write, in sample units.
    write_pos: AtomicU32,
    /// Next sample position the consumer will read, in sample units.
    read_pos: AtomicU32,
}

// SAFETY: one producer thread writes samples and write_pos, one consumer
// thread writes read_pos; all cross-thread coordination is atomic.
unsafe impl Sync for FrameRing {}
unsafe impl Send for FrameRing {}

impl FrameRing {
    const MASK: usize = RING_SAMPLES - 1;

    pub fn new() -> Self {
        Self {
            samples: UnsafeCell::new(vec![0u16; RING_SAMPLES + LAG_SAMPLES].into_boxed_slice()),
            write_pos: AtomicU32::new(0),
            read_pos: AtomicU32::new(0),
        }
    }

    /// Append one frame. Returns `false` without writing when the ring has
    /// no room, leaving the caller to retry after the consumer advances.
    #[inline]
    pub fn push_frame(&self, frame: &Frame) -> bool {
        let wp = self.write_pos.load(Ordering::Relaxed);
        let rp = self.read_pos.load(Ordering::Acquire);
        if wp.wrapping_sub(rp) as usize + FRAME_CHANNELS > RING_SAMPLES {
            return false;
        }

        let at = wp as usize & Self::MASK;
        // SAFETY: single producer; the full-check above keeps [at, at+16)
        // outside the consumer's unread span.
        unsafe {
            let buf = &mut *self.samples.get();
            buf[at..at + FRAME_CHANNELS].copy_from_slice(frame);
            if at < LAG_SAMPLES {
                buf[RING_SAMPLES + at..RING_SAMPLES + at + FRAME_CHANNELS].copy_from_slice(frame);
            }
        }
        self.write_pos
            .store(wp.wrapping_add(FRAME_CHANNELS as u32), Ordering::Release);
        true
    }

    /// Append decoded link words, two samples per word, low half first.
    ///
    /// All-or-nothing: returns `false` without writing when the whole slice
    /// does not fit.
    pub fn push_words(&self, words: &[u32]) -> bool {
        let wp = self.write_pos.load(Ordering::Relaxed);
        let rp = self.read_pos.load(Ordering::Acquire);
        let n = 2 * words.len();
        if wp.wrapping_sub(rp) as usize + n > RING_SAMPLES {
            return false;
        }

        // SAFETY: single producer; the full-check keeps the written span
        // outside the consumer's unread span.
        unsafe {
            let buf = &mut *self.samples.get();
            let mut at = wp as usize & Self::MASK;
            for &w in words {
                for s in [(w & 0xFFFF) as u16, (w >> 16) as u16] {
                    buf[at] = s;
                    if at < LAG_SAMPLES {
                        buf[RING_SAMPLES + at] = s;
                    }
                    at = (at + 1) & Self::MASK;
                }
            }
        }
        self.write_pos
            .store(wp.wrapping_add(n as u32), Ordering::Release);
        true
    }

    /// Copy out the frame at sample position `pos` and the one after it.
    ///
    /// `pos` must be frame-aligned. The mirror makes the second frame
    /// contiguous even when `pos` is the last frame of the ring.
    #[inline]
    pub fn frame_pair(&self, pos: u32) -> (Frame, Frame) {
        debug_assert_eq!(pos as usize % FRAME_CHANNELS, 0);
        let at = pos as usize & Self::MASK;
        let mut a: Frame = [0; FRAME_CHANNELS];
        let mut b: Frame = [0; FRAME_CHANNELS];
        // SAFETY: the producer never writes inside the consumer's unread
        // span, and the mirror tracks the head.
        unsafe {
            let buf = &*self.samples.get();
            a.copy_from_slice(&buf[at..at + FRAME_CHANNELS]);
            b.copy_from_slice(&buf[at + FRAME_CHANNELS..at + 2 * FRAME_CHANNELS]);
        }
        (a, b)
    }

    /// Copy out the single frame at sample position `pos`.
    #[inline]
    pub fn frame_at(&self, pos: u32) -> Frame {
        debug_assert_eq!(pos as usize % FRAME_CHANNELS, 0);
        let at = pos as usize & Self::MASK;
        let mut f: Frame = [0; FRAME_CHANNELS];
        // SAFETY: as for frame_pair.
        unsafe {
            let buf = &*self.samples.get();
            f.copy_from_slice(&buf[at..at + FRAME_CHANNELS]);
        }
        f
    }

    /// Recopy the head of the ring into its mirror tail.
    ///
    /// [`push_frame`](Self::push_frame) maintains the mirror itself; call
    /// this after filling the ring directly, as the static drive modes do.
    pub fn wrap_maintain(&self) {
        // SAFETY: callers run this before handing the ring to a consumer.
        unsafe {
            let buf = &mut *self.samples.get();
            let (head, tail) = buf.split_at_mut(RING_SAMPLES);
            tail.copy_from_slice(&head[..LAG_SAMPLES]);
        }
    }

    /// Fill the ring head with `frames` and prime both the mirror and the
    /// write position. Used by static drive modes that loop a fixed pattern.
    pub fn load_static(&self, frames: &[Frame]) {
        debug_assert!(frames.len() * FRAME_CHANNELS <= RING_SAMPLES);
        // SAFETY: static loads happen before a consumer is attached.
        unsafe {
            let buf = &mut *self.samples.get();
            for (i, f) in frames.iter().enumerate() {
                buf[i * FRAME_CHANNELS..(i + 1) * FRAME_CHANNELS].copy_from_slice(f);
            }
        }
        self.wrap_maintain();
        self.write_pos
            .store((frames.len() * FRAME_CHANNELS) as u32, Ordering::Release);
    }

    /// Zero the storage and both positions.
    ///
    /// Session-boundary use only: the drive side must not be mid-loop,
    /// because this writes the reader's counter.
    pub fn reset(&self) {
        // SAFETY: no consumer is attached at session boundaries.
        unsafe {
            (*self.samples.get()).fill(0);
        }
        self.write_pos.store(0, Ordering::Release);
        self.read_pos.store(0, Ordering::Release);
    }

    /// Rebase the write side just ahead of an overrunning reader and lay
    /// a fresh silent lead-in from there.
    ///
    /// The reader's counter is never written here; the drive side keeps
    /// its pre-advance cadence and lands inside the new lead-in.
    pub fn restart_write_side(&self) {
        let rp = self.read_pos.load(Ordering::Acquire);
        self.write_pos
            .store(rp.wrapping_add(FRAME_CHANNELS as u32), Ordering::Release);
        for _ in 0..LAG_FRAMES {
            if !self.push_frame(&SILENT_FRAME) {
                break;
            }
        }
    }

    #[inline]
    pub fn write_pos(&self) -> u32 {
        self.write_pos.load(Ordering::Acquire)
    }

    #[inline]
    pub fn read_pos(&self) -> u32 {
        self.read_pos.load(Ordering::Acquire)
    }

    /// Publish the consumer's new read position.
    #[inline]
    pub fn commit_read(&self, pos: u32) {
        self.read_pos.store(pos, Ordering::Release);
    }

    /// Samples buffered ahead of the consumer.
    #[inline]
    pub fn buffered(&self) -> u32 {
        self.write_pos
            .load(Ordering::Acquire)
            .wrapping_sub(self.read_pos.load(Ordering::Acquire))
    }

    /// True when the consumer position has passed the producer position.
    #[inline]
    pub fn consumer_overran(&self) -> bool {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Acquire);
        rp.wrapping_sub(wp) as i32 > 0
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new()
    }
}
