//! Bounded work queue and verdict worker pool.
//!
//! The packet source hands packets to [`PacketIntake::on_packet`], which
//! pushes them onto a bounded MPMC channel. A fixed set of worker threads
//! pops them, asks the [`PacketPolicy`] for a verdict and submits it to the
//! [`VerdictSink`]. Every packet that made it onto the queue gets exactly
//! one verdict, including during shutdown.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use parking_lot::RwLock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::metrics;
use crate::packet::QueuedPacket;
use crate::policy::{PacketPolicy, Verdict};
use crate::queue::VerdictSink;

/// What `on_packet` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backpressure {
    /// Block the caller until a worker frees a slot.
    #[default]
    Block,
    /// Wait at most this long, then accept the packet without inspection.
    Timeout(Duration),
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    /// Worker `i` is seeded with `seed + i`; OS entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1000,
            backpressure: Backpressure::Block,
            rng_seed: None,
        }
    }
}

/// How a packet was admitted by [`PacketIntake::on_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued for a worker.
    Queued,
    /// The queue stayed full; the packet was accepted on the spot.
    Bypassed,
}

/// A packet waiting in the queue.
pub struct WorkItem<P> {
    pub packet: P,
    pub enqueued_at: Instant,
}

impl<P> WorkItem<P> {
    pub fn new(packet: P) -> Self {
        Self {
            packet,
            enqueued_at: Instant::now(),
        }
    }
}

/// Counters shared by the intake path and the workers.
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
    bypassed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    /// Accept verdicts, bypassed packets included.
    pub accepted: u64,
    pub dropped: u64,
    pub bypassed: u64,
    /// Verdict computations or submissions that panicked.
    pub failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Accept => &self.accepted,
            Verdict::Drop => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_verdict(verdict);
    }
}

struct Shared<P: QueuedPacket> {
    /// `None` once shutdown has begun. Dropping the only sender is what
    /// lets the workers drain the queue and exit.
    tx: RwLock<Option<Sender<WorkItem<P>>>>,
    sink: Arc<dyn VerdictSink<P>>,
    stats: Arc<DispatchStats>,
    backpressure: Backpressure,
}

/// Cloneable handle used by the packet source to enqueue packets.
pub struct PacketIntake<P: QueuedPacket> {
    shared: Arc<Shared<P>>,
}

impl<P: QueuedPacket> Clone for PacketIntake<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: QueuedPacket> PacketIntake<P> {
    /// Queue `packet` for a verdict.
    ///
    /// Blocks while the queue is full (bounded by [`Backpressure::Timeout`]
    /// if configured). Fails with [`DispatchError::ShutDown`] once the
    /// dispatcher has started shutting down; such packets get no verdict.
    pub fn on_packet(&self, packet: P) -> Result<Admission, DispatchError> {
        // Held for the whole push so shutdown cannot close the queue under us.
        let guard = self.shared.tx.read();
        let Some(tx) = guard.as_ref() else {
            return Err(DispatchError::ShutDown);
        };

        let item = WorkItem::new(packet);
        match self.shared.backpressure {
            Backpressure::Block => {
                tx.send(item).map_err(|_| DispatchError::ShutDown)?;
            }
            Backpressure::Timeout(wait) => match tx.send_timeout(item, wait) {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(item)) => return Ok(self.bypass(item.packet)),
                Err(SendTimeoutError::Disconnected(_)) => return Err(DispatchError::ShutDown),
            },
        }

        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(Admission::Queued)
    }

    /// Number of packets currently waiting for a worker.
    pub fn queue_len(&self) -> usize {
        self.shared.tx.read().as_ref().map_or(0, Sender::len)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.tx.read().is_none()
    }

    fn bypass(&self, packet: P) -> Admission {
        let id = packet.id();
        warn!(id, "Work queue full, accepting packet without inspection");
        self.shared.stats.bypassed.fetch_add(1, Ordering::Relaxed);
        self.shared.stats.record(Verdict::Accept);
        metrics::record_bypass();

        if let Err(err) = self.shared.sink.submit(packet, Verdict::Accept) {
            warn!(id, %err, "Failed to submit verdict");
        }
        Admission::Bypassed
    }
}

/// A fixed pool of verdict workers fed by a bounded queue.
pub struct Dispatcher<P: QueuedPacket> {
    intake: PacketIntake<P>,
    stats: Arc<DispatchStats>,
    workers: Vec<JoinHandle<()>>,
}

impl<P: QueuedPacket> Dispatcher<P> {
    /// Spawn the worker pool.
    pub fn start(
        config: &DispatcherConfig,
        policy: Arc<dyn PacketPolicy>,
        sink: Arc<dyn VerdictSink<P>>,
    ) -> Result<Self, DispatchError> {
        if config.workers == 0 {
            return Err(DispatchError::ZeroWorkers);
        }
        if config.queue_capacity == 0 {
            return Err(DispatchError::ZeroCapacity);
        }

        let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity);
        let stats = Arc::new(DispatchStats::default());

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let worker = Worker {
                index,
                rx: rx.clone(),
                policy: Arc::clone(&policy),
                sink: Arc::clone(&sink),
                stats: Arc::clone(&stats),
                rng: worker_rng(config.rng_seed, index),
            };

            let spawned = thread::Builder::new()
                .name(format!("verdict-worker-{index}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    drop(tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(DispatchError::Spawn(err));
                }
            }
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            backpressure = ?config.backpressure,
            "Dispatcher started"
        );

        let intake = PacketIntake {
            shared: Arc::new(Shared {
                tx: RwLock::new(Some(tx)),
                sink,
                stats: Arc::clone(&stats),
                backpressure: config.backpressure,
            }),
        };

        Ok(Self {
            intake,
            stats,
            workers,
        })
    }

    /// A handle for the packet source thread.
    pub fn intake(&self) -> PacketIntake<P> {
        self.intake.clone()
    }

    /// Shorthand for [`PacketIntake::on_packet`].
    pub fn on_packet(&self, packet: P) -> Result<Admission, DispatchError> {
        self.intake.on_packet(packet)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop intake, let the workers drain the queue and wait for them.
    ///
    /// Every packet queued before this call gets its verdict before it
    /// returns; nothing is submitted afterwards.
    pub fn shutdown(mut self) -> Result<StatsSnapshot, DispatchError> {
        info!(
            queued = self.intake.queue_len(),
            "Shutting down dispatcher, draining queued packets"
        );
        self.close();

        let panicked = self.join_workers();
        if panicked > 0 {
            return Err(DispatchError::WorkerPanicked(panicked));
        }

        let stats = self.stats.snapshot();
        info!(
            accepted = stats.accepted,
            dropped = stats.dropped,
            bypassed = stats.bypassed,
            failed = stats.failed,
            "Dispatcher stopped"
        );
        Ok(stats)
    }

    fn close(&self) {
        drop(self.intake.shared.tx.write().take());
    }

    fn join_workers(&mut self) -> usize {
        self.workers
            .drain(..)
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count()
    }
}

impl<P: QueuedPacket> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.close();
            self.join_workers();
        }
    }
}

impl<P: QueuedPacket> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.workers.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

fn worker_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => StdRng::from_entropy(),
    }
}

struct Worker<P: QueuedPacket> {
    index: usize,
    rx: Receiver<WorkItem<P>>,
    policy: Arc<dyn PacketPolicy>,
    sink: Arc<dyn VerdictSink<P>>,
    stats: Arc<DispatchStats>,
    rng: StdRng,
}

impl<P: QueuedPacket> Worker<P> {
    fn run(mut self) {
        debug!(worker = self.index, "Verdict worker started");
        // recv keeps returning queued items after the sender is gone
        while let Ok(item) = self.rx.recv() {
            self.process(item);
        }
        debug!(worker = self.index, "Verdict worker stopped");
    }

    fn process(&mut self, item: WorkItem<P>) {
        let WorkItem {
            packet,
            enqueued_at,
        } = item;
        metrics::record_queue_wait(enqueued_at.elapsed());

        let id = packet.id();
        let policy = &self.policy;
        let rng = &mut self.rng;
        let decided = panic::catch_unwind(AssertUnwindSafe(|| {
            policy.decide(id, packet.payload(), rng)
        }));

        let verdict = decided.unwrap_or_else(|_| {
            error!(
                worker = self.index,
                id, "Verdict computation panicked, accepting packet"
            );
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_worker_failure();
            Verdict::Accept
        });

        self.stats.record(verdict);

        let sink = &self.sink;
        let submitted = panic::catch_unwind(AssertUnwindSafe(|| sink.submit(packet, verdict)));
        match submitted {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(worker = self.index, id, %err, "Failed to submit verdict"),
            Err(_) => {
                error!(worker = self.index, id, "Verdict submission panicked");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_worker_failure();
            }
        }
    }
}
