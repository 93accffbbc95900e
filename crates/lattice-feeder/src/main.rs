//! Lattice feeder - builds array payloads and pumps them over the bulk link
//!
//! Scans the configured directory for source recordings (or falls back
//! to a built-in generator), draws the channel map, multiplexes across
//! the endpoints, escapes the stream for the wire, and keeps the
//! transfer carousel full until stopped.
//!
//! ## Usage
//!
//! - `lattice-feeder` - build a payload per the config and stream it
//! - `lattice-feeder payload.bin` - stream a prebuilt payload file
//! - `--once`: stop after one pass instead of cycling forever
//! - `--write-config`: write the current config to disk and exit

mod config;
mod payload;
mod sources;
mod transport;

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use lattice_core::mux::MuxMode;
use lattice_core::types::{PCM_PACKET_SIZE, SOURCE_RATE};
use lattice_core::wire;

use config::FeederConfig;
use payload::Payload;
use sources::Generator;
use transport::{ChunkPump, LoopbackTransport};

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let once = args.iter().any(|a| a == "--once");
    let write_config = args.iter().any(|a| a == "--write-config");
    let prebuilt: Option<PathBuf> = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from);

    log::info!("lattice-feeder starting up");

    let config_path = config::default_config_path();
    let cfg = config::load_config(&config_path);
    if write_config {
        config::save_config(&cfg, &config_path)?;
        return Ok(());
    }

    // Both ends must agree on the byte map before anything is sent.
    wire::self_test()?;

    let payload = match prebuilt {
        Some(path) => payload::load_prebuilt(&path)?,
        None => build_from_config(&cfg)?,
    };
    let mut pump = ChunkPump::new(&payload.bytes, cfg.link.chunk_size, cfg.link.log_every)?;
    let pass_chunks = (payload.bytes.len() / cfg.link.chunk_size) as u64;
    log::info!(
        "streaming {} ticks per pass ({:.3}s of source time), {} transfer chunks",
        payload.ticks,
        payload.seconds(),
        pass_chunks
    );

    // No bus backend is compiled in yet; the loopback link drains at the
    // array's real-time rate so pump behavior and throughput are
    // representative.
    let rate = u64::from(SOURCE_RATE) * PCM_PACKET_SIZE as u64;
    log::info!(
        "hub {:04x}:{:04x}: driving the loopback link at {:.1} MiB/s",
        cfg.link.vendor_id,
        cfg.link.product_id,
        rate as f64 / 1024.0 / 1024.0
    );
    let mut transport = LoopbackTransport::new(rate);

    let total = if once { pass_chunks } else { 0 };
    pump.run(&mut transport, cfg.link.transfers, total)?;
    Ok(())
}

/// Resolve sources per the config and assemble the escaped payload.
fn build_from_config(cfg: &FeederConfig) -> Result<Payload> {
    let mode = if cfg.source.onebit {
        MuxMode::OneBit
    } else {
        MuxMode::Pcm
    };
    let files = sources::scan_sources(&cfg.source.dir, &cfg.source.extensions)?;
    let (bank, map_override) = if files.is_empty() {
        let generator = Generator::from_name(&cfg.source.generator)
            .ok_or_else(|| anyhow!("unknown generator {:?}", cfg.source.generator))?;
        log::info!(
            "no sources under {:?}, generating {:?} ({} s)",
            cfg.source.dir,
            generator,
            cfg.source.generate_seconds
        );
        let ticks = cfg.source.generate_seconds as usize * SOURCE_RATE as usize;
        sources::generate_bank(mode, generator, ticks)
    } else {
        log::info!("building payload from {} sources", files.len());
        (sources::load_bank(mode, &files)?, None)
    };
    payload::build(&bank, map_override, cfg.source.assign_seed)
}
