//! Offline end-to-end exercise of the playback pipeline.
//!
//! Builds a short demonstration payload, escapes it for the wire, and
//! plays it through a full two-thread session against clocked in-memory
//! sinks. Useful as a smoke check on a development host with no array
//! hardware attached: the session report and the per-sink duty summary
//! make regressions in the pump, codec, or shaper visible without a
//! scope.
//!
//! ## Flags
//!
//! - `--raw`: forward a multiplexed stream unshaped, the hub-side path
//! - `--pwm`: drive the 3-bit PWM banding instead of full resolution
//! - `--clocked`: use the real drive-clock ratio instead of unity
//! - a bare number: payload length in transfer chunks (default 8)

use anyhow::Result;

use lattice_core::engine::{DriveMode, StepRatio, NUM_SINKS};
use lattice_core::hw::{ClockedSink, MemoryLink};
use lattice_core::mux::{assign_channels, pcm};
use lattice_core::session::{Coordinator, SessionConfig};
use lattice_core::types::{
    Frame, FRAME_CHANNELS, LINK_CHUNK_SIZE, PACKET_ALIGN, PCM_CHANNELS,
};
use lattice_core::wire;

/// Words per second each sink drains. Sets the offline tick rate well
/// below the link pace, so the drive side can never outrun the pump the
/// way an unthrottled thread would.
const SINK_RATE: u64 = 1_000_000;

/// Modeled output FIFO depth in words.
const SINK_DEPTH: u64 = 8;

/// Payload length in transfer chunks when no length is given.
const DEFAULT_CHUNKS: usize = 8;

/// Seed for the channel map and the dither pool; fixed so runs compare.
const DEMO_SEED: u64 = 7;

/// Frames carried by one transfer chunk of the sample stream.
const CHUNK_FRAMES: usize = LINK_CHUNK_SIZE / (2 * FRAME_CHANNELS);

/// One cycle of a full-scale offset-binary sine, 256 steps.
fn sine_table() -> [u16; 256] {
    std::array::from_fn(|i| {
        let phase = std::f64::consts::TAU * i as f64 / 256.0;
        (32767.5 + 32767.5 * phase.sin()).round() as u16
    })
}

/// Demonstration fill: every channel runs the table at its own harmonic,
/// with three half-amplitude variants spread across the range so single
/// channels are easy to identify on a capture. Scaled into the link
/// domain, which carries seven bits per byte.
fn demo_frames(ticks: usize) -> Vec<Frame> {
    let sinw = sine_table();
    (0..ticks)
        .map(|i| {
            let mut f: Frame = [0; FRAME_CHANNELS];
            for (j, s) in f.iter_mut().enumerate() {
                *s = sinw[(i * (j + 1)) & 0xFF];
            }
            f[1] = sinw[i & 0xFF] / 2 + 16384;
            f[2] = sinw[i & 0xFF] / 2;
            f[3] = sinw[i & 0xFF] / 2 + 32768;
            for s in f.iter_mut() {
                *s = (*s >> 1) & 0x7F7F;
            }
            f
        })
        .collect()
}

/// Serialize frames for the wire: little-endian samples, escaped, then
/// packed four bytes per link word in memory order.
fn frames_to_link_words(frames: &[Frame]) -> Vec<u32> {
    let mut bytes = Vec::with_capacity(frames.len() * FRAME_CHANNELS * 2);
    for f in frames {
        for s in f {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
    }
    wire::encode_payload(&mut bytes);
    bytemuck::pod_collect_to_vec(&bytes)
}

/// Hub-side payload: a few tones multiplexed across the full channel
/// map, escaped, and packed into link words.
fn mux_link_words(ticks: usize) -> Result<Vec<u32>> {
    let sinw = sine_table();
    let sources: Vec<Vec<u16>> = (0..3)
        .map(|s| (0..ticks).map(|i| sinw[(i * (s + 1)) & 0xFF]).collect())
        .collect();
    let map = assign_channels(PCM_CHANNELS, sources.len(), DEMO_SEED)?;
    let mut stream = pcm::mux_assigned(&sources, &map, ticks)?;
    wire::encode_payload(&mut stream);
    Ok(bytemuck::pod_collect_to_vec(&stream))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let raw = args.iter().any(|a| a == "--raw");
    let pwm = args.iter().any(|a| a == "--pwm");
    let clocked = args.iter().any(|a| a == "--clocked");
    let chunks = args
        .iter()
        .find_map(|a| a.parse::<usize>().ok())
        .unwrap_or(DEFAULT_CHUNKS);

    let (mode, step) = if raw {
        (DriveMode::Raw, StepRatio::UNITY)
    } else {
        match (pwm, clocked) {
            (true, true) => (DriveMode::SdPwm, StepRatio::CLK_DIV_896),
            (true, false) => (DriveMode::SdPwm, StepRatio::UNITY),
            (false, true) => (DriveMode::SdDither, StepRatio::CLK_DIV_1024),
            (false, false) => (DriveMode::SdDither, StepRatio::UNITY),
        }
    };
    log::info!(
        "loopback: {:?}, step {}+{}/{}, {} chunks",
        mode,
        step.int,
        step.num,
        step.den,
        chunks
    );

    let words = if mode == DriveMode::Raw {
        mux_link_words(chunks * PACKET_ALIGN)?
    } else {
        frames_to_link_words(&demo_frames(chunks * CHUNK_FRAMES))
    };
    log::info!(
        "payload: {} link words, {} KiB escaped",
        words.len(),
        words.len() * 4 / 1024
    );

    let mut coordinator = Coordinator::new(SessionConfig {
        mode,
        step,
        dither_seed: DEMO_SEED,
    })?;
    let mut link = MemoryLink::new(words);
    let sinks: [ClockedSink; NUM_SINKS] =
        std::array::from_fn(|_| ClockedSink::new(SINK_RATE, SINK_DEPTH));

    let (report, sinks) = coordinator.run_session(&mut link, sinks)?;

    log::info!(
        "drive summary: {} ticks, {} faults, {} stream bytes",
        report.drive_triple.0,
        report.drive_triple.1,
        report.drive_triple.2
    );
    log::info!(
        "feed summary: {} pace ticks, {} incomplete, {} pop timeouts, {} underflow pops",
        report.feed.ticks,
        report.feed.incomplete,
        report.feed.pop_timeouts,
        link.underflows
    );
    for (k, sink) in sinks.iter().enumerate() {
        let bits = sink.pushed * 32;
        let duty = if bits == 0 {
            0.0
        } else {
            100.0 * sink.ones as f64 / bits as f64
        };
        log::info!("sink {:2}: {:8} words, {:5.1}% duty", k, sink.pushed, duty);
    }
    if report.handoff_timeouts > 0 || report.engine.late_ticks > 0 {
        log::warn!(
            "degraded run: {} handoff timeouts, {} late ticks",
            report.handoff_timeouts,
            report.engine.late_ticks
        );
    }
    Ok(())
}
