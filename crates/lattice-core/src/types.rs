//! Common types and stream geometry for Lattice
//!
//! This module holds the fixed constants shared by the host-side stream
//! builders and the device-side playback path: endpoint counts, packet
//! framing sizes, and the playback ring geometry. All framing is purely
//! positional; none of these values are negotiated at runtime.

/// Nominal source sample rate in Hz. The device output clock is free-running;
/// the resampler ratio (not this constant) is what keeps long-run sync.
pub const SOURCE_RATE: u32 = 44_100;

/// Number of physical serial endpoints on the link. Each endpoint carries one
/// bit per transmitted word.
pub const NUM_ENDPOINTS: usize = 16;

/// Channels carried per endpoint in the PCM layout.
pub const PCM_CH_PER_ENDPOINT: usize = 16;

/// Total channels in the PCM layout.
pub const PCM_CHANNELS: usize = NUM_ENDPOINTS * PCM_CH_PER_ENDPOINT;

/// Channels carried per endpoint in the one-bit (oversampled) layout.
pub const ONEBIT_CH_PER_ENDPOINT: usize = 4;

/// Total channels in the one-bit layout.
pub const ONEBIT_CHANNELS: usize = NUM_ENDPOINTS * ONEBIT_CH_PER_ENDPOINT;

/// Oversampled one-bit data per channel per tick, in bytes (64 bits at 8x).
pub const ONEBIT_OSR: usize = 64 / 8;

/// Bytes in one PCM packet (one tick across all channels, 2 bytes/sample).
pub const PCM_PACKET_SIZE: usize = PCM_CHANNELS * 2;

/// Bytes in one PCM chunk (one channel group's slice of a packet).
pub const PCM_CHUNK_SIZE: usize = NUM_ENDPOINTS * 2;

/// Bytes in one one-bit packet.
pub const ONEBIT_PACKET_SIZE: usize = ONEBIT_CHANNELS * ONEBIT_OSR;

/// Bytes in one one-bit chunk.
pub const ONEBIT_CHUNK_SIZE: usize = NUM_ENDPOINTS * ONEBIT_OSR;

/// Bytes in one one-bit slice (16 bits of oversampled data per channel).
pub const ONEBIT_SLICE_SIZE: usize = NUM_ENDPOINTS * 2;

// Both layouts frame to the same packet size, so one alignment serves both.
const _: () = assert!(PCM_PACKET_SIZE == ONEBIT_PACKET_SIZE);

/// Bulk-transfer chunk size used by the host pump, in bytes.
pub const LINK_CHUNK_SIZE: usize = 16 * 1024;

/// Packets per transfer chunk. Payloads are truncated to a whole number of
/// chunks so every transfer carries whole packets.
pub const PACKET_ALIGN: usize = LINK_CHUNK_SIZE / PCM_PACKET_SIZE;

const _: () = assert!(PACKET_ALIGN.is_power_of_two());

/// Channels in one playback frame on the device side.
pub const FRAME_CHANNELS: usize = 16;

/// Frames in the playback ring (power of two).
pub const RING_FRAMES: usize = 1024;

/// Frames the producer must buffer before playback starts; also the length
/// of the wrap mirror past the nominal end of the ring.
pub const LAG_FRAMES: usize = 512;

const _: () = assert!(RING_FRAMES.is_power_of_two());
const _: () = assert!(LAG_FRAMES <= RING_FRAMES);

/// Ring capacity in samples (positions are counted in sample units).
pub const RING_SAMPLES: usize = RING_FRAMES * FRAME_CHANNELS;

/// Lead-in length in samples.
pub const LAG_SAMPLES: usize = LAG_FRAMES * FRAME_CHANNELS;

/// One playback frame: one offset-binary sample per device channel.
pub type Frame = [u16; FRAME_CHANNELS];

/// A frame of zero samples; the quantizer maps it to zero drive.
pub const SILENT_FRAME: Frame = [0; FRAME_CHANNELS];
