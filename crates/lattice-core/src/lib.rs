//! Lattice Core - Shared library for the stream builders and the playback path

pub mod engine;
pub mod error;
pub mod hw;
pub mod mux;
pub mod ring;
pub mod session;
pub mod types;
pub mod wire;

pub use types::*;
