//! Bulk-link pump: a fixed carousel of transfer buffers kept in flight.
//!
//! The transport seam is narrow on purpose: submit a filled buffer on a
//! slot, hear back on a completion channel. The pump owns the staging
//! buffers and the refill order; while the bus works on the submitted
//! slots, exactly one slot is free and being refilled, so the link never
//! waits on payload preparation.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};

/// Asynchronous bulk writer toward the array hub.
///
/// A submission failure is fatal to the streaming session; there is no
/// partial recovery on the link.
pub trait BulkTransport {
    /// Queue the filled buffer on transfer slot `slot`.
    fn submit(&mut self, slot: usize, buf: &[u8]) -> Result<()>;
    /// Completion events, one slot index per finished transfer.
    fn completions(&self) -> Receiver<usize>;
}

/// Carousel pump cycling a payload through a transport.
pub struct ChunkPump<'p> {
    payload: &'p [u8],
    chunk_size: usize,
    next_offset: usize,
    /// Completions inside the current logging window.
    window_chunks: u64,
    window_start: Instant,
    log_every: u64,
    msg_id: u64,
}

impl<'p> ChunkPump<'p> {
    pub fn new(payload: &'p [u8], chunk_size: usize, log_every: u64) -> Result<Self> {
        ensure!(chunk_size > 0, "chunk size must be nonzero");
        ensure!(
            !payload.is_empty() && payload.len() % chunk_size == 0,
            "payload of {} bytes is not a whole number of {} byte chunks",
            payload.len(),
            chunk_size
        );
        Ok(Self {
            payload,
            chunk_size,
            next_offset: 0,
            window_chunks: 0,
            window_start: Instant::now(),
            log_every,
            msg_id: 0,
        })
    }

    /// Copy the next chunk into `buf`, cycling to the payload start at
    /// the end.
    fn fill(&mut self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.payload[self.next_offset..self.next_offset + self.chunk_size]);
        self.next_offset += self.chunk_size;
        if self.next_offset >= self.payload.len() {
            self.next_offset = 0;
        }
    }

    fn note_completion(&mut self) {
        self.window_chunks += 1;
        if self.log_every == 0 || self.window_chunks % self.log_every != 0 {
            return;
        }
        let elapsed = self.window_start.elapsed();
        let sent = (self.window_chunks * self.chunk_size as u64) as f64 / 1024.0 / 1024.0;
        let speed = sent / elapsed.as_secs_f64();
        log::info!(
            "{:04X} | sent: {:.1}MiB, time: {:.3}ms, speed: {:.3}MiB/s",
            self.msg_id,
            sent,
            elapsed.as_secs_f64() * 1000.0,
            speed
        );
        self.msg_id += 1;
        self.window_chunks = 0;
        self.window_start = Instant::now();
    }

    /// Run the carousel until `total_chunks` transfers complete; zero
    /// streams forever.
    ///
    /// All but one slot are filled and submitted up front; from then on
    /// each completion frees a slot, and the one spare is refilled and
    /// submitted while the bus drains the rest.
    pub fn run<T: BulkTransport>(
        &mut self,
        transport: &mut T,
        slots: usize,
        total_chunks: u64,
    ) -> Result<u64> {
        ensure!(slots >= 2, "the carousel needs at least two transfer slots");
        let mut staging = vec![vec![0u8; self.chunk_size]; slots];
        let completions = transport.completions();

        for slot in 0..slots - 1 {
            self.fill(&mut staging[slot]);
            transport.submit(slot, &staging[slot])?;
        }
        let mut free_slot = slots - 1;
        self.window_start = Instant::now();

        let mut done = 0u64;
        while total_chunks == 0 || done < total_chunks {
            let finished = completions
                .recv()
                .context("transport closed its completion channel")?;
            done += 1;
            self.note_completion();

            self.fill(&mut staging[free_slot]);
            transport.submit(free_slot, &staging[free_slot])?;
            free_slot = finished;
        }
        log::info!("pump done: {} chunks sent", done);
        Ok(done)
    }
}

/// In-process transport draining submitted chunks at a fixed byte rate,
/// standing in for the bulk link when no hub is attached. A worker
/// thread holds each submission for the time the real bus would take.
pub struct LoopbackTransport {
    submissions: Sender<(usize, usize)>,
    completions: Receiver<usize>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LoopbackTransport {
    /// A loopback link draining `rate` bytes per second.
    pub fn new(rate: u64) -> Self {
        let (submit_tx, submit_rx) = unbounded::<(usize, usize)>();
        let (complete_tx, complete_rx) = unbounded();
        let worker = thread::Builder::new()
            .name("lattice-lo-link".into())
            .spawn(move || {
                while let Ok((slot, len)) = submit_rx.recv() {
                    let ns = len as u64 * 1_000_000_000 / rate.max(1);
                    thread::sleep(Duration::from_nanos(ns));
                    if complete_tx.send(slot).is_err() {
                        break;
                    }
                }
            })
            .expect("Failed to spawn loopback link thread");
        Self {
            submissions: submit_tx,
            completions: complete_rx,
            worker: Some(worker),
        }
    }
}

impl BulkTransport for LoopbackTransport {
    fn submit(&mut self, slot: usize, buf: &[u8]) -> Result<()> {
        self.submissions
            .send((slot, buf.len()))
            .context("loopback link thread is gone")
    }

    fn completions(&self) -> Receiver<usize> {
        self.completions.clone()
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        // Closing the submission side lets the worker run down.
        let (dead_tx, _) = unbounded();
        self.submissions = dead_tx;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Test transport that records every chunk and completes instantly.
#[cfg(test)]
pub struct RecordingTransport {
    pub chunks: Vec<Vec<u8>>,
    complete_tx: Sender<usize>,
    complete_rx: Receiver<usize>,
    /// Submissions left before `submit` starts failing; `None` never
    /// fails.
    pub fail_after: Option<usize>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn new() -> Self {
        let (complete_tx, complete_rx) = unbounded();
        Self {
            chunks: Vec::new(),
            complete_tx,
            complete_rx,
            fail_after: None,
        }
    }
}

#[cfg(test)]
impl BulkTransport for RecordingTransport {
    fn submit(&mut self, slot: usize, buf: &[u8]) -> Result<()> {
        if let Some(left) = self.fail_after.as_mut() {
            if *left == 0 {
                anyhow::bail!("bus rejected the transfer");
            }
            *left -= 1;
        }
        self.chunks.push(buf.to_vec());
        self.complete_tx.send(slot).unwrap();
        Ok(())
    }

    fn completions(&self) -> Receiver<usize> {
        self.complete_rx.clone()
    }
}
