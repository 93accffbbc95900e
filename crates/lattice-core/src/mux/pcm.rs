//! PCM bit-plane multiplexer
//!
//! Stream structure, one tick:
//!   packet = 16 chunks, one per channel group
//!   chunk  = 16 words, one per sample bit, MSB first
//!   word   = 16 bits, one per endpoint, little-endian on the wire
//!
//! Channel `c` lives in group `c / 16` on endpoint lane `c % 16`.

use crate::error::{MuxError, MuxResult};
use crate::types::{
    NUM_ENDPOINTS, PCM_CHANNELS, PCM_CH_PER_ENDPOINT, PCM_CHUNK_SIZE, PCM_PACKET_SIZE, SOURCE_RATE,
};

/// Scatter one tick of samples (one per channel) into a packet.
pub fn pack_tick(src: &[u16; PCM_CHANNELS], out: &mut [u8]) {
    debug_assert_eq!(out.len(), PCM_PACKET_SIZE);
    for g in 0..PCM_CH_PER_ENDPOINT {
        let chunk = g * PCM_CHUNK_SIZE;
        let lanes = &src[g * NUM_ENDPOINTS..(g + 1) * NUM_ENDPOINTS];
        for w in 0..16 {
            let mut word = 0u16;
            for (p, &sample) in lanes.iter().enumerate() {
                let bit = (sample >> (15 - w)) & 1;
                word |= bit << p;
            }
            out[chunk + 2 * w] = (word & 0xFF) as u8;
            out[chunk + 2 * w + 1] = (word >> 8) as u8;
        }
    }
}

/// Gather samples back out of a packet; the exact inverse of [`pack_tick`].
pub fn unpack_tick(packet: &[u8], out: &mut [u16; PCM_CHANNELS]) {
    debug_assert_eq!(packet.len(), PCM_PACKET_SIZE);
    for g in 0..PCM_CH_PER_ENDPOINT {
        let chunk = g * PCM_CHUNK_SIZE;
        for p in 0..NUM_ENDPOINTS {
            let mut sample = 0u16;
            for w in 0..16 {
                let word =
                    u16::from_le_bytes([packet[chunk + 2 * w], packet[chunk + 2 * w + 1]]);
                sample |= ((word >> p) & 1) << (15 - w);
            }
            out[g * NUM_ENDPOINTS + p] = sample;
        }
    }
}

/// Multiplex assigned sources into a chunk-aligned link stream.
///
/// `map[c]` names the source feeding channel `c`. The stream is truncated to
/// whole transfer chunks; every source must cover the aligned length.
pub fn mux_assigned(
    sources: &[Vec<u16>],
    map: &[usize],
    ticks: usize,
) -> MuxResult<Vec<u8>> {
    if sources.is_empty() {
        return Err(MuxError::NoSources);
    }
    if map.len() != PCM_CHANNELS {
        return Err(MuxError::ChannelSplit {
            channels: map.len(),
            endpoints: NUM_ENDPOINTS,
        });
    }
    let ticks = super::align_ticks(ticks)?;
    for src in sources {
        if src.len() < ticks {
            return Err(MuxError::SourceTooShort {
                need: ticks,
                have: src.len(),
            });
        }
    }

    let mut out = vec![0u8; ticks * PCM_PACKET_SIZE];
    let mut gather = [0u16; PCM_CHANNELS];
    for t in 0..ticks {
        for (c, &s) in map.iter().enumerate() {
            gather[c] = sources[s][t];
        }
        pack_tick(&gather, &mut out[t * PCM_PACKET_SIZE..(t + 1) * PCM_PACKET_SIZE]);
        if ((t + 1) & 0xFFFF) == 0 {
            log::info!("multiplexed {:.2}s", t as f32 / SOURCE_RATE as f32);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PACKET_ALIGN;

    fn tick_pattern(offset: u16) -> [u16; PCM_CHANNELS] {
        let mut src = [0u16; PCM_CHANNELS];
        for (c, s) in src.iter_mut().enumerate() {
            *s = (c as u16).wrapping_mul(257).wrapping_add(offset);
        }
        src
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let src = tick_pattern(0xBEEF);
        let mut packet = [0u8; PCM_PACKET_SIZE];
        pack_tick(&src, &mut packet);
        let mut back = [0u16; PCM_CHANNELS];
        unpack_tick(&packet, &mut back);
        assert_eq!(src, back);
    }

    #[test]
    fn test_single_channel_lands_on_its_lane() {
        // Channel 37 = group 2, lane 5. Its MSB goes to word 0 of chunk 2,
        // bit 5 of the little-endian word.
        let mut src = [0u16; PCM_CHANNELS];
        src[37] = 0x8000;
        let mut packet = [0u8; PCM_PACKET_SIZE];
        pack_tick(&src, &mut packet);
        let chunk = 2 * PCM_CHUNK_SIZE;
        let word0 = u16::from_le_bytes([packet[chunk], packet[chunk + 1]]);
        assert_eq!(word0, 1 << 5);
        // Nothing else in the packet is set.
        let ones: u32 = packet.iter().map(|b| b.count_ones()).sum();
        assert_eq!(ones, 1);
    }

    #[test]
    fn test_word_order_is_msb_first() {
        let mut src = [0u16; PCM_CHANNELS];
        src[0] = 0x0001; // LSB only -> last word of chunk 0
        let mut packet = [0u8; PCM_PACKET_SIZE];
        pack_tick(&src, &mut packet);
        let word15 = u16::from_le_bytes([packet[30], packet[31]]);
        assert_eq!(word15, 1);
        assert_eq!(u16::from_le_bytes([packet[0], packet[1]]), 0);
    }

    #[test]
    fn test_mux_assigned_round_trip() {
        let ticks = PACKET_ALIGN;
        let sources: Vec<Vec<u16>> = (0..3)
            .map(|s| (0..ticks).map(|t| (s * 1000 + t) as u16).collect())
            .collect();
        let map = crate::mux::assign_channels(PCM_CHANNELS, sources.len(), 5).unwrap();
        let stream = mux_assigned(&sources, &map, ticks).unwrap();
        assert_eq!(stream.len(), ticks * PCM_PACKET_SIZE);

        let mut back = [0u16; PCM_CHANNELS];
        for t in 0..ticks {
            unpack_tick(&stream[t * PCM_PACKET_SIZE..(t + 1) * PCM_PACKET_SIZE], &mut back);
            for c in 0..PCM_CHANNELS {
                assert_eq!(back[c], sources[map[c]][t], "tick {} channel {}", t, c);
            }
        }
    }

    #[test]
    fn test_short_source_is_rejected() {
        let sources = vec![vec![0u16; 4]];
        let map = vec![0usize; PCM_CHANNELS];
        assert!(matches!(
            mux_assigned(&sources, &map, PACKET_ALIGN),
            Err(MuxError::SourceTooShort { .. })
        ));
    }
}
