//! One-bit (oversampled) bit-plane multiplexer
//!
//! Stream structure, one tick:
//!   packet = 4 chunks, one per channel group
//!   chunk  = 4 slices, one per 16 bits of oversampled data
//!   slice  = 16 words, one per bit of the sub-word, MSB first
//!   word   = 16 bits, one per endpoint, little-endian on the wire
//!
//! Each channel contributes 64 one-bit samples per tick (8x oversampling),
//! carried as four little-endian 16-bit sub-words taken from consecutive
//! source bytes. Channel `c` lives in group `c / 16` on lane `c % 16`.

use crate::error::{MuxError, MuxResult};
use crate::types::{
    NUM_ENDPOINTS, ONEBIT_CHANNELS, ONEBIT_CH_PER_ENDPOINT, ONEBIT_CHUNK_SIZE, ONEBIT_OSR,
    ONEBIT_PACKET_SIZE, ONEBIT_SLICE_SIZE, SOURCE_RATE,
};

/// Sub-words per channel per tick.
pub const SUB_WORDS: usize = 4;

/// One tick's worth of gathered sub-words, `SUB_WORDS` per channel.
pub type TickWords = [u16; ONEBIT_CHANNELS * SUB_WORDS];

/// Scatter one tick of sub-words into a packet.
///
/// `src[SUB_WORDS * c + sl]` is channel `c`'s sub-word `sl`.
pub fn pack_tick(src: &TickWords, out: &mut [u8]) {
    debug_assert_eq!(out.len(), ONEBIT_PACKET_SIZE);
    for g in 0..ONEBIT_CH_PER_ENDPOINT {
        let chunk = g * ONEBIT_CHUNK_SIZE;
        for sl in 0..SUB_WORDS {
            let slice = chunk + sl * ONEBIT_SLICE_SIZE;
            for w in 0..16 {
                let mut word = 0u16;
                for p in 0..NUM_ENDPOINTS {
                    let sample = src[SUB_WORDS * (g * NUM_ENDPOINTS + p) + sl];
                    word |= ((sample >> (15 - w)) & 1) << p;
                }
                out[slice + 2 * w] = (word & 0xFF) as u8;
                out[slice + 2 * w + 1] = (word >> 8) as u8;
            }
        }
    }
}

/// Gather sub-words back out of a packet; the exact inverse of [`pack_tick`].
pub fn unpack_tick(packet: &[u8], out: &mut TickWords) {
    debug_assert_eq!(packet.len(), ONEBIT_PACKET_SIZE);
    for g in 0..ONEBIT_CH_PER_ENDPOINT {
        let chunk = g * ONEBIT_CHUNK_SIZE;
        for sl in 0..SUB_WORDS {
            let slice = chunk + sl * ONEBIT_SLICE_SIZE;
            for p in 0..NUM_ENDPOINTS {
                let mut sample = 0u16;
                for w in 0..16 {
                    let word =
                        u16::from_le_bytes([packet[slice + 2 * w], packet[slice + 2 * w + 1]]);
                    sample |= ((word >> p) & 1) << (15 - w);
                }
                out[SUB_WORDS * (g * NUM_ENDPOINTS + p) + sl] = sample;
            }
        }
    }
}

/// Gather one tick of sub-words from raw one-bit source streams.
///
/// Channel `c` reads `ONEBIT_OSR` consecutive bytes starting at byte
/// `ONEBIT_OSR * tick` of its assigned source.
pub fn gather_tick(sources: &[Vec<u8>], map: &[usize], tick: usize, out: &mut TickWords) {
    for (c, &s) in map.iter().enumerate() {
        let base = ONEBIT_OSR * tick;
        for sl in 0..SUB_WORDS {
            let lo = sources[s][base + 2 * sl];
            let hi = sources[s][base + 2 * sl + 1];
            out[SUB_WORDS * c + sl] = u16::from(lo) | (u16::from(hi) << 8);
        }
    }
}

/// Multiplex assigned one-bit sources into a chunk-aligned link stream.
pub fn mux_assigned(
    sources: &[Vec<u8>],
    map: &[usize],
    ticks: usize,
) -> MuxResult<Vec<u8>> {
    if sources.is_empty() {
        return Err(MuxError::NoSources);
    }
    if map.len() != ONEBIT_CHANNELS {
        return Err(MuxError::ChannelSplit {
            channels: map.len(),
            endpoints: NUM_ENDPOINTS,
        });
    }
    let ticks = super::align_ticks(ticks)?;
    let need = ticks * ONEBIT_OSR;
    for src in sources {
        if src.len() < need {
            return Err(MuxError::SourceTooShort {
                need,
                have: src.len(),
            });
        }
    }

    let mut out = vec![0u8; ticks * ONEBIT_PACKET_SIZE];
    let mut gathered: TickWords = [0; ONEBIT_CHANNELS * SUB_WORDS];
    for t in 0..ticks {
        gather_tick(sources, map, t, &mut gathered);
        pack_tick(
            &gathered,
            &mut out[t * ONEBIT_PACKET_SIZE..(t + 1) * ONEBIT_PACKET_SIZE],
        );
        if ((t + 1) & 0xFFFF) == 0 {
            log::info!("multiplexed {:.2}s", t as f32 / SOURCE_RATE as f32);
        }
    }
    Ok(out)
}
