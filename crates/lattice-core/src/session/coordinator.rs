//! Producer-side owner of the playback lifecycle.
//!
//! One session runs on two sides: this side verifies the mailbox ready
//! exchange, lays the silent lead-in, flips the lifecycle flag, and paces
//! the link pump until the source is exhausted; the drive side runs on its
//! own thread, gated only by the flag and its sink backpressure. Shutdown
//! is a bounded handoff so a wedged peer can never hang the caller.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::{
    DriveEngine, DriveMode, EngineStats, PatternTable, Quantizer, StepRatio, NUM_SINKS, RAW_SINKS,
    ROW_WORDS,
};
use crate::error::{LatticeResult, SessionError, SessionResult};
use crate::hw::{LinkSource, WordSink};
use crate::ring::FrameRing;
use crate::session::flag::{PlaybackState, SessionFlag};
use crate::session::mailbox::{mailbox, MailReceiver, MailSender};
use crate::session::producer::{FeedOutcome, FeedStats, LinkProducer};
use crate::types::{LAG_FRAMES, LAG_SAMPLES, SILENT_FRAME};
use crate::wire;

/// Ready token the drive side opens the handshake with.
pub const DRIVE_READY: u32 = 0xFEED_BAC0;

/// Ready token the feed side answers with.
pub const FEED_READY: u32 = 0xFEED_BAC1;

/// Drive-side acknowledgment that its loop has exited.
pub const STOP_ACK: u32 = 0xFEED_BAC2;

/// Mailbox request for the drive-side counter triple.
const STATS_REQUEST: u32 = 0;

/// Poll budget for each side of the ready exchange and the stop handoff.
const HANDSHAKE_POLLS: u32 = 1 << 24;

/// Pacing period of the feed loop.
const PACE: Duration = Duration::from_millis(1);

/// Shortened pace after a tick that could not feed.
const HALF_PACE: Duration = Duration::from_micros(500);

/// Zero words pushed per sink before the first tick, covering the output
/// enable latency.
pub const PRIME_WORDS: usize = 10;

/// State both sides of a session share.
#[derive(Default)]
pub struct SessionShared {
    pub ring: FrameRing,
    pub flag: SessionFlag,
}

impl SessionShared {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-stream playback parameters.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub mode: DriveMode,
    pub step: StepRatio,
    pub dither_seed: u64,
}

/// Mode-specific drive state resolved at construction.
#[derive(Clone)]
enum DrivePlan {
    Raw,
    Shaped {
        quantizer: Quantizer,
        table: Arc<PatternTable>,
    },
}

/// Counters collected when a session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub engine: EngineStats,
    pub feed: FeedStats,
    /// Drive-side summary received over the mailbox: ticks, faults, bytes.
    pub drive_triple: (u32, u32, u32),
    /// Stop acknowledgments that never arrived and were forced by timeout.
    pub handoff_timeouts: u32,
}

/// Flip the session to `Playing` once the lead-in is buffered.
///
/// Refused while the ring holds less than the lead-in, so playback can
/// never begin into an underrun.
pub fn try_start(shared: &SessionShared) -> bool {
    shared.ring.write_pos() >= LAG_SAMPLES as u32 && shared.flag.advance(PlaybackState::Playing)
}

/// Reset the ring and lay the silent lead-in the drive side plays while
/// real data lands.
///
/// Runs before the start flip, while the drive side is still gated on
/// the lifecycle flag, so nothing reads mid-reset.
fn lay_lead_in(ring: &FrameRing) {
    ring.reset();
    for _ in 0..LAG_FRAMES {
        let laid = ring.push_frame(&SILENT_FRAME);
        debug_assert!(laid, "lead-in fill into a reset ring");
    }
}

/// Session runner pairing a feed loop with one drive thread per session.
pub struct Coordinator {
    shared: Arc<SessionShared>,
    plan: DrivePlan,
    step: StepRatio,
}

impl Coordinator {
    /// Validate the wire codec and build this mode's pattern table.
    pub fn new(config: SessionConfig) -> LatticeResult<Self> {
        wire::self_test()?;
        let plan = match (
            config.mode.build_table(config.dither_seed)?,
            config.mode.quantizer(),
        ) {
            (Some(table), Some(quantizer)) => DrivePlan::Shaped {
                quantizer,
                table: Arc::new(table),
            },
            _ => DrivePlan::Raw,
        };
        Ok(Self {
            shared: Arc::new(SessionShared::new()),
            plan,
            step: config.step,
        })
    }

    /// The shared state, for inspection between sessions.
    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    /// Play one stream from `link` to completion.
    ///
    /// Spawns the drive thread, runs the ready exchange, lays the lead-in,
    /// and paces the link pump until the source is exhausted. The sinks
    /// come back with the report once the drive side has stopped.
    pub fn run_session<L, S>(
        &mut self,
        link: &mut L,
        sinks: [S; NUM_SINKS],
    ) -> SessionResult<(SessionReport, [S; NUM_SINKS])>
    where
        L: LinkSource,
        S: WordSink + Send + 'static,
    {
        let (mut to_drive_tx, to_drive_rx) = mailbox();
        let (to_feed_tx, mut to_feed_rx) = mailbox();

        let shared = self.shared.clone();
        let plan = self.plan.clone();
        let step = self.step;
        let drive = thread::Builder::new()
            .name("lattice-drive".into())
            .spawn(move || drive_main(&shared, plan, step, sinks, to_feed_tx, to_drive_rx))
            .expect("Failed to spawn drive thread");

        // Both sides verify the ready exchange before any state moves. On
        // a mismatch the peer gives up on its own bounded wait, so the
        // join below cannot hang.
        match to_feed_rx.recv_within(HANDSHAKE_POLLS) {
            Ok(DRIVE_READY) => {}
            Ok(got) => {
                let _ = drive.join();
                return Err(SessionError::BadToken {
                    got,
                    want: DRIVE_READY,
                });
            }
            Err(e) => {
                let _ = drive.join();
                return Err(e);
            }
        }
        to_drive_tx.send(FEED_READY);

        lay_lead_in(&self.shared.ring);
        let started = try_start(&self.shared);
        debug_assert!(started, "start after the lead-in prefill");

        let mut producer = LinkProducer::new();
        loop {
            match producer.pump_tick(&self.shared.ring, link) {
                FeedOutcome::Fed(_) => thread::sleep(PACE),
                // An unprimed ring (Deferred) or a rebase after an
                // overrun (Restarted) retries on the short pace.
                FeedOutcome::Deferred | FeedOutcome::Restarted => thread::sleep(HALF_PACE),
                FeedOutcome::Exhausted => break,
            }
        }

        let requested = self.shared.flag.advance(PlaybackState::StopRequested);
        debug_assert!(requested, "stop request from a playing session");

        let mut handoff_timeouts = 0u32;
        match to_feed_rx.recv_within(HANDSHAKE_POLLS) {
            Ok(STOP_ACK) => {}
            Ok(got) => {
                log::error!("unexpected stop token {:#010X}", got);
                handoff_timeouts += 1;
            }
            Err(_) => {
                log::error!("drive side missed the stop handoff");
                handoff_timeouts += 1;
            }
        }
        let stopped = self.shared.flag.advance(PlaybackState::Stopped);
        debug_assert!(stopped, "stop ack closes the handoff");

        to_drive_tx.send(STATS_REQUEST);
        let drive_triple = (
            to_feed_rx.recv_within(HANDSHAKE_POLLS).unwrap_or(0),
            to_feed_rx.recv_within(HANDSHAKE_POLLS).unwrap_or(0),
            to_feed_rx.recv_within(HANDSHAKE_POLLS).unwrap_or(0),
        );

        let (drive_result, sinks) = drive.join().map_err(|e| SessionError::DriveLost {
            reason: format!("{:?}", e),
        })?;
        let engine = drive_result?;

        let parked = self.shared.flag.advance(PlaybackState::NotStarted);
        debug_assert!(parked, "flag parks for the next session");

        let report = SessionReport {
            engine,
            feed: producer.stats,
            drive_triple,
            handoff_timeouts,
        };
        log::info!(
            "session done: {} drive ticks, {} fed words, {} stalls, {} late, {} restarts",
            report.engine.ticks,
            report.feed.words,
            report.engine.fifo_stalls,
            report.engine.late_ticks,
            report.feed.restarts,
        );
        Ok((report, sinks))
    }
}

/// Drive-thread body: handshake, prime the sinks, tick until stopped,
/// then answer the counter request.
fn drive_main<S: WordSink>(
    shared: &SessionShared,
    plan: DrivePlan,
    step: StepRatio,
    mut sinks: [S; NUM_SINKS],
    mut to_feed: MailSender,
    mut to_drive: MailReceiver,
) -> (SessionResult<EngineStats>, [S; NUM_SINKS]) {
    to_feed.send(DRIVE_READY);
    match to_drive.recv_within(HANDSHAKE_POLLS) {
        Ok(FEED_READY) => {}
        Ok(got) => {
            return (
                Err(SessionError::BadToken {
                    got,
                    want: FEED_READY,
                }),
                sinks,
            )
        }
        Err(e) => return (Err(e), sinks),
    }

    while shared.flag.get() != PlaybackState::Playing {
        thread::yield_now();
    }

    for sink in sinks.iter_mut() {
        sink.reset();
        for _ in 0..PRIME_WORDS {
            sink.push(0);
        }
    }

    let mut engine = match &plan {
        // Raw ticks never consult the quantizer.
        DrivePlan::Raw => DriveEngine::new(step, Quantizer::FULL_RES),
        DrivePlan::Shaped { quantizer, .. } => DriveEngine::new(step, *quantizer),
    };
    match &plan {
        DrivePlan::Raw => {
            while shared.flag.get() == PlaybackState::Playing {
                engine.tick_raw(&shared.ring, &mut sinks);
            }
        }
        DrivePlan::Shaped { table, .. } => {
            while shared.flag.get() == PlaybackState::Playing {
                engine.tick_shaped(&shared.ring, table, &mut sinks);
            }
        }
    }

    to_feed.send(STOP_ACK);
    let stats = engine.stats;
    if to_drive.recv_within(HANDSHAKE_POLLS) == Ok(STATS_REQUEST) {
        let tick_bytes = match &plan {
            DrivePlan::Raw => RAW_SINKS * 2 * 4,
            DrivePlan::Shaped { .. } => NUM_SINKS * 2 * ROW_WORDS * 4,
        };
        to_feed.send(stats.ticks as u32);
        to_feed.send((stats.fifo_stalls + stats.late_ticks) as u32);
        to_feed.send(stats.ticks.wrapping_mul(tick_bytes as u64) as u32);
    }
    (Ok(stats), sinks)
}
