//! Bit-plane stream builders for the serial link
//!
//! The link carries many channels over few endpoints by transposing sample
//! bits: each transmitted word holds one bit (at one significance) from every
//! endpoint's channel. Two layouts exist, PCM (16 channels per endpoint,
//! 16-bit samples) and one-bit (4 channels per endpoint, 8x oversampled).
//! Both frame to 512-byte packets, one per tick.

pub mod assign;
pub mod onebit;
pub mod pcm;

pub use assign::assign_channels;

use crate::error::{MuxError, MuxResult};
use crate::types::PACKET_ALIGN;

/// Which stream layout a payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxMode {
    /// 16 channels per endpoint, 16-bit linear samples.
    Pcm,
    /// 4 channels per endpoint, 8x-oversampled one-bit samples.
    OneBit,
}

/// Truncate a tick count to a whole number of transfer chunks.
///
/// Short sources lose their tail rather than being padded; an empty result
/// is an error because the pump cannot submit a partial chunk.
pub fn align_ticks(ticks: usize) -> MuxResult<usize> {
    let aligned = ticks & !(PACKET_ALIGN - 1);
    if aligned == 0 {
        return Err(MuxError::PayloadTooShort);
    }
    Ok(aligned)
}
