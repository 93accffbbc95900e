//! Shared playback lifecycle flag.

use std::sync::atomic::{AtomicU8, Ordering};

/// Session lifecycle, advanced strictly around the cycle
/// `NotStarted -> Playing -> StopRequested -> Stopped -> NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    NotStarted = 0,
    Playing = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl PlaybackState {
    /// The one state this state may advance to.
    pub fn next(&self) -> PlaybackState {
        match self {
            PlaybackState::NotStarted => PlaybackState::Playing,
            PlaybackState::Playing => PlaybackState::StopRequested,
            PlaybackState::StopRequested => PlaybackState::Stopped,
            PlaybackState::Stopped => PlaybackState::NotStarted,
        }
    }

    fn from_u8(v: u8) -> PlaybackState {
        match v {
            1 => PlaybackState::Playing,
            2 => PlaybackState::StopRequested,
            3 => PlaybackState::Stopped,
            _ => PlaybackState::NotStarted,
        }
    }
}

/// Atomic cell holding the lifecycle flag.
///
/// The producer core owns every transition; the consumer core only
/// observes. Illegal jumps are refused, which pins the cycle order no
/// matter how callers race session boundaries.
#[derive(Debug)]
pub struct SessionFlag(AtomicU8);

impl SessionFlag {
    pub fn new() -> Self {
        Self(AtomicU8::new(PlaybackState::NotStarted as u8))
    }

    #[inline]
    pub fn get(&self) -> PlaybackState {
        PlaybackState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance to `to` if it is the legal successor of the current state.
    pub fn advance(&self, to: PlaybackState) -> bool {
        let cur = self.get();
        if cur.next() != to {
            return false;
        }
        self.0
            .compare_exchange(cur as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for SessionFlag {
    fn default() -> Self {
        Self::new()
    }
}
