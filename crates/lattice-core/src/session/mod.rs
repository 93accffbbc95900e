//! Two-sided playback sessions: handshake, lifecycle, and link ingest.

pub mod coordinator;
pub mod flag;
pub mod mailbox;
pub mod producer;

pub use coordinator::{
    try_start, Coordinator, SessionConfig, SessionReport, SessionShared, DRIVE_READY, FEED_READY,
    STOP_ACK,
};
pub use flag::{PlaybackState, SessionFlag};
pub use mailbox::{mailbox, MailReceiver, MailSender};
pub use producer::{FeedOutcome, FeedStats, LinkProducer, BUNDLE_WORDS, FEED_PACE};
