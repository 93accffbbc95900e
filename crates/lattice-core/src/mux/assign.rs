//! Channel-to-source assignment for demo and test payloads
//!
//! Demo payloads are usually built from far fewer source recordings than the
//! array has channel slots, so each slot draws one source uniformly at
//! random, with replacement. The draw is seeded so a payload can be rebuilt
//! bit-identically.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::error::{MuxError, MuxResult};

/// Assign every channel slot one source index.
///
/// Uniform with replacement; reproducible for a given seed. Every slot gets
/// exactly one source.
pub fn assign_channels(
    num_channels: usize,
    num_sources: usize,
    seed: u64,
) -> MuxResult<Vec<usize>> {
    if num_sources == 0 {
        return Err(MuxError::NoSources);
    }
    let mut rng = Pcg32::seed_from_u64(seed);
    Ok((0..num_channels)
        .map(|_| rng.random_range(0..num_sources))
        .collect())
}
