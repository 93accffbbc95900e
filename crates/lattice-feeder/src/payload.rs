//! Payload assembly: a source bank through the multiplexer and the wire
//! escape, out as the chunk-aligned byte stream the pump cycles.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};

use lattice_core::mux::{self, assign_channels, onebit, pcm};
use lattice_core::types::{
    LINK_CHUNK_SIZE, ONEBIT_CHANNELS, PCM_CHANNELS, PCM_PACKET_SIZE, SOURCE_RATE,
};
use lattice_core::wire;

use crate::sources::SourceBank;

/// An escaped, chunk-aligned link payload.
pub struct Payload {
    pub bytes: Vec<u8>,
    /// Source ticks carried; one packet per tick.
    pub ticks: usize,
}

impl Payload {
    /// Play time of one pass, in seconds of source time. Both layouts
    /// frame to the same packet size, so this needs no mode.
    pub fn seconds(&self) -> f64 {
        self.bytes.len() as f64 / (f64::from(SOURCE_RATE) * PCM_PACKET_SIZE as f64)
    }
}

/// Multiplex `bank` across the channel map and escape it for the wire.
///
/// `map_override` pins the channel map (the identification pattern wires
/// lane to lane); otherwise every channel draws a source from the seeded
/// assignment. The stream is truncated to whole transfer chunks.
pub fn build(bank: &SourceBank, map_override: Option<Vec<usize>>, seed: u64) -> Result<Payload> {
    ensure!(!bank.is_empty(), "no usable sources in the bank");
    let ticks = mux::align_ticks(bank.ticks())?;
    let mut bytes = match bank {
        SourceBank::Pcm(sources) => {
            let map = match map_override {
                Some(map) => map,
                None => assign_channels(PCM_CHANNELS, sources.len(), seed)?,
            };
            pcm::mux_assigned(sources, &map, ticks)?
        }
        SourceBank::OneBit(sources) => {
            let map = match map_override {
                Some(map) => map,
                None => assign_channels(ONEBIT_CHANNELS, sources.len(), seed)?,
            };
            onebit::mux_assigned(sources, &map, ticks)?
        }
    };
    wire::encode_payload(&mut bytes);
    debug_assert_eq!(bytes.len() % LINK_CHUNK_SIZE, 0);
    log::info!(
        "payload: {} sources over {} ticks, {} KiB escaped",
        bank.len(),
        ticks,
        bytes.len() / 1024
    );
    Ok(Payload { bytes, ticks })
}

/// Load a prebuilt payload file, truncated to whole transfer chunks.
/// The file is taken as already escaped.
pub fn load_prebuilt(path: &Path) -> Result<Payload> {
    let mut bytes =
        std::fs::read(path).with_context(|| format!("Failed to read payload {:?}", path))?;
    let aligned = bytes.len() & !(LINK_CHUNK_SIZE - 1);
    if aligned == 0 {
        bail!(
            "payload {:?} is shorter than one transfer chunk ({} bytes)",
            path,
            bytes.len()
        );
    }
    bytes.truncate(aligned);
    let ticks = aligned / PCM_PACKET_SIZE;
    log::info!("loaded payload {:?}: {} ticks", path, ticks);
    Ok(Payload { bytes, ticks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::types::PACKET_ALIGN;
    use lattice_core::wire::RESERVED;

    #[test]
    fn test_build_aligns_and_escapes() {
        // One chunk worth of ticks plus a tail that must be dropped.
        let ticks = PACKET_ALIGN + 7;
        let bank = SourceBank::Pcm(vec![vec![0xFFFF; ticks], vec![0x8000; ticks]]);
        let payload = build(&bank, None, 3).unwrap();

        assert_eq!(payload.ticks, PACKET_ALIGN);
        assert_eq!(payload.bytes.len(), LINK_CHUNK_SIZE);
        assert!(payload.bytes.iter().all(|&b| b != RESERVED));
    }

    #[test]
    fn test_build_with_short_bank_fails() {
        let bank = SourceBank::Pcm(vec![vec![0; PACKET_ALIGN - 1]]);
        assert!(build(&bank, None, 0).is_err());
        assert!(build(&SourceBank::Pcm(vec![]), None, 0).is_err());
    }

    #[test]
    fn test_build_onebit_layout() {
        use lattice_core::types::ONEBIT_OSR;
        let ticks = PACKET_ALIGN * 2;
        let bank = SourceBank::OneBit(vec![vec![0x55; ticks * ONEBIT_OSR]]);
        let payload = build(&bank, Some(vec![0; ONEBIT_CHANNELS]), 0).unwrap();
        assert_eq!(payload.bytes.len(), 2 * LINK_CHUNK_SIZE);
    }

    #[test]
    fn test_same_seed_same_payload() {
        let ticks = PACKET_ALIGN;
        let bank = SourceBank::Pcm(vec![
            (0..ticks).map(|t| t as u16).collect(),
            (0..ticks).map(|t| (t * 3) as u16).collect(),
            vec![0xAAAA; ticks],
        ]);
        let a = build(&bank, None, 11).unwrap();
        let b = build(&bank, None, 11).unwrap();
        let c = build(&bank, None, 12).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_ne!(a.bytes, c.bytes);
    }

    #[test]
    fn test_seconds_counts_packets() {
        let payload = Payload {
            bytes: vec![0; LINK_CHUNK_SIZE],
            ticks: PACKET_ALIGN,
        };
        // 32 packets at 44.1 kHz.
        let want = 32.0 / 44100.0;
        assert!((payload.seconds() - want).abs() < 1e-9);
    }
}
