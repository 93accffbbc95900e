//! Payload sources: recordings on disk and built-in test signals.
//!
//! Recordings come in three forms. WAV files are rescaled into the
//! half-range offset-binary domain the drive boards expect; `.pcm16`
//! files are raw little-endian samples already in that domain; `.dsd64`
//! files are raw oversampled bitstreams for the one-bit layout. When a
//! scan finds nothing, a deterministic generator stands in so the link
//! can always be exercised.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use lattice_core::mux::MuxMode;
use lattice_core::types::{NUM_ENDPOINTS, ONEBIT_CHANNELS, ONEBIT_OSR, PCM_CHANNELS, SOURCE_RATE};

/// Samples between amplitude renormalizations of the tone phasor.
const RENORM_PERIOD: usize = 1 << 14;

/// A loaded bank of sources, ready for the multiplexer.
pub enum SourceBank {
    /// 16-bit offset-binary sample streams.
    Pcm(Vec<Vec<u16>>),
    /// Oversampled one-bit streams, eight bytes per tick.
    OneBit(Vec<Vec<u8>>),
}

impl SourceBank {
    /// Number of sources in the bank.
    pub fn len(&self) -> usize {
        match self {
            SourceBank::Pcm(s) => s.len(),
            SourceBank::OneBit(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ticks every source can cover; the shortest source bounds the bank.
    pub fn ticks(&self) -> usize {
        match self {
            SourceBank::Pcm(s) => s.iter().map(Vec::len).min().unwrap_or(0),
            SourceBank::OneBit(s) => s.iter().map(|v| v.len() / ONEBIT_OSR).min().unwrap_or(0),
        }
    }
}

/// Built-in signals used when no recordings are on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    /// Rising sine sweep, the bring-up listening signal.
    Sweep,
    /// Fixed 440 Hz tone from a rotating phasor.
    Tone,
    /// Three DC levels at quarter, half, and three-quarter scale.
    Constant,
    /// Full-range wrapping ramp.
    Ramp,
    /// Per-lane identification constants, wired lane to lane.
    Pattern,
}

impl Generator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sweep" => Some(Generator::Sweep),
            "tone" => Some(Generator::Tone),
            "constant" => Some(Generator::Constant),
            "ramp" => Some(Generator::Ramp),
            "pattern" => Some(Generator::Pattern),
            _ => None,
        }
    }
}

/// Scan `dir` for files with one of the configured extensions, sorted by
/// name so payload builds are reproducible. A missing directory is an
/// empty scan, not an error.
pub fn scan_sources(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        log::info!("source dir {:?} does not exist", dir);
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to scan source dir {:?}", dir))?;
    for entry in entries {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if path.is_file() && extensions.iter().any(|e| e == ext) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Load every scanned file that fits the layout. Files for the other
/// layout are skipped with a warning rather than failing the build.
pub fn load_bank(mode: MuxMode, files: &[PathBuf]) -> Result<SourceBank> {
    match mode {
        MuxMode::Pcm => {
            let mut sources = Vec::new();
            for path in files {
                match path.extension().and_then(|e| e.to_str()) {
                    Some("wav") => sources.push(read_wav(path)?),
                    Some("pcm16") => sources.push(read_pcm16(path)?),
                    _ => log::warn!("skipping {:?}: not a PCM source", path),
                }
            }
            Ok(SourceBank::Pcm(sources))
        }
        MuxMode::OneBit => {
            let mut sources = Vec::new();
            for path in files {
                match path.extension().and_then(|e| e.to_str()) {
                    Some("dsd64") => sources.push(read_dsd64(path)?),
                    _ => log::warn!("skipping {:?}: not a one-bit source", path),
                }
            }
            Ok(SourceBank::OneBit(sources))
        }
    }
}

/// Build a generated bank. The identification pattern comes with its own
/// channel map; every other generator uses the seeded draw.
pub fn generate_bank(
    mode: MuxMode,
    generator: Generator,
    ticks: usize,
) -> (SourceBank, Option<Vec<usize>>) {
    if mode == MuxMode::OneBit {
        // No delta-sigma modulator on the host; generated one-bit
        // payloads are the 50% idle density.
        let channels = ONEBIT_CHANNELS;
        let silence = vec![0x55u8; ticks * ONEBIT_OSR];
        return (SourceBank::OneBit(vec![silence]), Some(vec![0; channels]));
    }
    match generator {
        Generator::Sweep => (SourceBank::Pcm(vec![sweep_source(ticks)]), None),
        Generator::Tone => (SourceBank::Pcm(vec![tone_source(ticks)]), None),
        Generator::Constant => (
            SourceBank::Pcm(vec![
                vec![0x4000; ticks],
                vec![0x8000; ticks],
                vec![0xC000; ticks],
            ]),
            None,
        ),
        Generator::Ramp => (
            SourceBank::Pcm(vec![(0..ticks).map(|s| s as u16).collect()]),
            None,
        ),
        Generator::Pattern => {
            let (sources, map) = pattern_bank(ticks);
            (SourceBank::Pcm(sources), Some(map))
        }
    }
}

/// First channel of a 16-bit WAV, rescaled to half range around the
/// offset-binary midpoint. Half scale keeps headroom over the array and
/// matches how release payloads are mastered.
fn read_wav(path: &Path) -> Result<Vec<u16>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV {:?}", path))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        bail!("{:?}: only 16-bit integer WAV is supported", path);
    }
    if spec.sample_rate != SOURCE_RATE {
        log::warn!(
            "{:?}: {} Hz will play detuned against the {} Hz link",
            path,
            spec.sample_rate,
            SOURCE_RATE
        );
    }
    let step = spec.channels as usize;
    let mut out = Vec::with_capacity(reader.len() as usize / step);
    for (k, sample) in reader.samples::<i16>().enumerate() {
        let sample = sample.with_context(|| format!("Failed to read WAV {:?}", path))?;
        if k % step == 0 {
            out.push(((i32::from(sample) + 0x8000) >> 1) as u16);
        }
    }
    log::info!("loaded {:?}: {} samples", path, out.len());
    Ok(out)
}

/// Raw little-endian samples, already in the link's offset-binary range.
fn read_pcm16(path: &Path) -> Result<Vec<u16>> {
    let mut bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    bytes.truncate(bytes.len() & !1);
    let out: Vec<u16> = bytemuck::pod_collect_to_vec(&bytes);
    log::info!("loaded {:?}: {} samples", path, out.len());
    Ok(out)
}

/// Raw oversampled one-bit stream, eight bytes per source tick.
fn read_dsd64(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    log::info!("loaded {:?}: {} ticks", path, bytes.len() / ONEBIT_OSR);
    Ok(bytes)
}

/// Sine sweep rising from 220 Hz to 21x that over the run; every channel
/// hears the same signal.
fn sweep_source(ticks: usize) -> Vec<u16> {
    let mut phase = 0.0f64;
    (0..ticks)
        .map(|s| {
            let v = (65535.0 * 0.5 * (phase.sin() + 1.0)) as u16;
            let freq = 220.0 * (20.0 * s as f64 + ticks as f64) / ticks as f64;
            phase += freq * std::f64::consts::TAU / f64::from(SOURCE_RATE);
            v
        })
        .collect()
}

/// 440 Hz tone from a rotating complex phasor. The rotation slowly bends
/// the amplitude, so it is pulled back to scale every [`RENORM_PERIOD`]
/// samples rather than per tick.
fn tone_source(ticks: usize) -> Vec<u16> {
    let w = 440.0 * std::f64::consts::TAU / f64::from(SOURCE_RATE);
    let (rc, rs) = (w.cos(), w.sin());
    let mut a = 32767.0f64;
    let mut b = 0.0f64;
    (0..ticks)
        .map(|s| {
            if s % RENORM_PERIOD == 0 {
                let norm = 32767.0 / (a * a + b * b).sqrt();
                a *= norm;
                b *= norm;
            }
            let v = (32768.0 + b) as u16;
            let (ra, rb) = (rc * a - rs * b, rc * b + rs * a);
            a = ra;
            b = rb;
            v
        })
        .collect()
}

/// Every channel of endpoint lane `k` carries the constant `0xCAF0 | k`,
/// so a logic capture identifies the wiring at a glance.
fn pattern_bank(ticks: usize) -> (Vec<Vec<u16>>, Vec<usize>) {
    let sources = (0..NUM_ENDPOINTS)
        .map(|k| vec![0xCAF0 | k as u16; ticks])
        .collect();
    let map = (0..PCM_CHANNELS).map(|c| c % NUM_ENDPOINTS).collect();
    (sources, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_generator_names() {
        assert_eq!(Generator::from_name("sweep"), Some(Generator::Sweep));
        assert_eq!(Generator::from_name("pattern"), Some(Generator::Pattern));
        assert_eq!(Generator::from_name("noise"), None);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = temp_dir().join("lattice-test-scan");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.pcm16"), [0u8; 4]).unwrap();
        std::fs::write(dir.join("a.pcm16"), [0u8; 4]).unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        let found = scan_sources(&dir, &["pcm16".into()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a.pcm16", "b.pcm16"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = temp_dir().join("lattice-test-scan-nonexistent");
        let found = scan_sources(&dir, &["wav".into()]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_pcm16_reads_little_endian() {
        let dir = temp_dir().join("lattice-test-pcm16");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("s.pcm16");
        std::fs::write(&path, [0x34, 0x12, 0x78, 0x56, 0xFF]).unwrap();

        let samples = read_pcm16(&path).unwrap();
        // The odd trailing byte is dropped.
        assert_eq!(samples, [0x1234, 0x5678]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sweep_starts_at_midpoint_and_swings_full_range() {
        let src = sweep_source(4096);
        assert_eq!(src[0], 32767);
        assert!(src.iter().any(|&v| v > 60000));
        assert!(src.iter().any(|&v| v < 5000));
    }

    #[test]
    fn test_tone_amplitude_survives_renormalization() {
        let src = tone_source(3 * RENORM_PERIOD);
        let min = *src.iter().min().unwrap();
        let max = *src.iter().max().unwrap();
        // Full swing, no runaway and no collapse.
        assert!(min < 1024, "min {}", min);
        assert!(max > 64512, "max {}", max);
    }

    #[test]
    fn test_pattern_bank_wires_lane_to_lane() {
        let (sources, map) = pattern_bank(8);
        assert_eq!(sources.len(), NUM_ENDPOINTS);
        assert_eq!(map.len(), PCM_CHANNELS);
        assert_eq!(sources[5][0], 0xCAF5);
        for (c, &s) in map.iter().enumerate() {
            assert_eq!(s, c % NUM_ENDPOINTS);
        }
    }

    #[test]
    fn test_bank_ticks_is_shortest_source() {
        let bank = SourceBank::Pcm(vec![vec![0; 100], vec![0; 64]]);
        assert_eq!(bank.ticks(), 64);
        let bank = SourceBank::OneBit(vec![vec![0; 80]]);
        assert_eq!(bank.ticks(), 10);
    }
}
