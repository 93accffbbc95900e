//! Error types for the streaming core
//!
//! Startup failures (codec self-test, table validation, bad stream geometry)
//! are fatal and surface as `Result`s. Real-time faults (FIFO stalls, late
//! ticks) are never errors; they are counted in the session statistics.

use thiserror::Error;

/// Errors from the wire escape codec self-test
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Round trip over the payload domain failed
    #[error("escape round-trip failed for {value}: decoded {got}")]
    RoundTrip { value: u8, got: u8 },

    /// Encoder emitted the reserved control byte
    #[error("escape of {value} hit the reserved byte 0x7F")]
    Reserved { value: u8 },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors from stream multiplexing and payload assembly
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MuxError {
    /// Channel count does not split evenly across endpoints
    #[error("{channels} channels do not split across {endpoints} endpoints")]
    ChannelSplit { channels: usize, endpoints: usize },

    /// Channel assignment requested with no sources loaded
    #[error("no sources available for channel assignment")]
    NoSources,

    /// Source material too short for the requested stream length
    #[error("source too short: need {need} ticks, have {have}")]
    SourceTooShort { need: usize, have: usize },

    /// Payload shorter than one transfer chunk after alignment
    #[error("payload shorter than one transfer chunk after alignment")]
    PayloadTooShort,
}

/// Result type for mux operations
pub type MuxResult<T> = Result<T, MuxError>;

/// Errors from engine table construction
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A pattern row's population does not match its load
    #[error("pattern row {load} has popcount {popcount}")]
    LoadMismatch { load: usize, popcount: u32 },

    /// Quantizer can index past the end of the pattern table
    #[error("quantizer reaches word {max_index} of a {len}-word table")]
    TableOverrun { max_index: usize, len: usize },
}

/// Result type for engine setup
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the two-core session handshake
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The peer core did not respond within the poll budget
    #[error("handshake timed out after {polls} polls")]
    HandshakeTimeout { polls: u32 },

    /// The peer core answered with the wrong ready token
    #[error("unexpected handshake token {got:#010X} (wanted {want:#010X})")]
    BadToken { got: u32, want: u32 },

    /// The drive thread terminated without reporting back
    #[error("drive thread lost: {reason}")]
    DriveLost { reason: String },
}

/// Result type for session control operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Any error the core can raise; binaries bubble these up as one type
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LatticeError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result type spanning every core subsystem
pub type LatticeResult<T> = Result<T, LatticeError>;
