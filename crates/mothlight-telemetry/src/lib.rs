//! Crawler telemetry: in-memory occurrence counting with a scheduled,
//! merge-on-write CSV ledger.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      TELEMETRY SINK                            │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌──────────┐  record()   ┌──────────────┐                     │
//! │  │ request  │────────────►│  occurrence  │                     │
//! │  │ handlers │             │   counter    │                     │
//! │  └──────────┘             └──────┬───────┘                     │
//! │                                  │ drain() (atomic)            │
//! │  ┌──────────┐   tick      ┌──────▼───────┐    ┌─────────────┐  │
//! │  │  flush   │────────────►│    ledger    │───►│ <root>/YYYY/ │  │
//! │  │scheduler │             │    merger    │    │ <Month>/D.csv│  │
//! │  └──────────┘             └──────────────┘    └─────────────┘  │
//! │                                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter is the only shared mutable state: request handlers increment
//! it concurrently while a single background task drains it into the day's
//! ledger partition on a fixed schedule. A failed cycle leaves the delta in
//! memory, so persistence is at-least-once and never blocks request serving.

pub mod ledger;


use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

pub use crate::ledger::{sanitize_signature, FlushError, MergeReport, PartitionKey};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the telemetry sink.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Root directory of the date-partitioned ledger.
    ///
    /// `None` leaves the sink inert: [`TelemetrySink::record`] still succeeds
    /// but no flush task is scheduled and nothing is ever persisted.
    pub ledger_root: Option<PathBuf>,
    /// Fixed period of the flush scheduler.
    pub flush_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            ledger_root: None,
            flush_interval: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Telemetry Sink
// ============================================================================

/// Outcome of one flush cycle.
#[derive(Debug, Clone)]
pub enum FlushOutcome {
    /// No ledger root configured; nothing to do, ever.
    Inert,
    /// The counter was empty at this tick; no filesystem work happened.
    Idle,
    /// The delta was merged into the day's partition.
    Flushed(MergeReport),
}

/// Process-wide crawler telemetry sink.
///
/// Holds the occurrence counter (sanitized signature → count) behind a single
/// exclusive lock, so `record` and the flush cycle's drain are mutually
/// exclusive. `record` never touches the filesystem; all I/O happens in the
/// flush cycle.
pub struct TelemetrySink {
    config: TelemetryConfig,
    counts: Mutex<BTreeMap<String, u64>>,
    /// Serializes flush cycles: the scheduler is the only steady-state
    /// caller, but shutdown may issue a final `flush_now` while a tick is
    /// still in flight.
    flush_gate: Mutex<()>,
}

impl TelemetrySink {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            counts: Mutex::new(BTreeMap::new()),
            flush_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Record one observation of `raw_signature`.
    ///
    /// The signature is sanitized at the point of capture (the ledger format
    /// has no escaping scheme) and its count incremented, inserting at 1 if
    /// absent. Infallible.
    pub fn record(&self, raw_signature: &str) {
        let signature = sanitize_signature(raw_signature);
        let mut counts = self.counts.lock();
        let slot = counts.entry(signature).or_insert(0);
        *slot = slot.saturating_add(1);
    }

    /// True when no observations are waiting to be flushed.
    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }

    /// Number of distinct signatures waiting to be flushed.
    pub fn pending_signatures(&self) -> usize {
        self.counts.lock().len()
    }

    /// Atomically take the accumulated delta, leaving the counter empty.
    fn drain(&self) -> BTreeMap<String, u64> {
        std::mem::take(&mut *self.counts.lock())
    }

    /// Merge a drained delta back after a failed flush so the next tick
    /// retries with the full accumulated counts. Observations recorded while
    /// the flush was in flight are preserved additively.
    fn restore(&self, delta: BTreeMap<String, u64>) {
        let mut counts = self.counts.lock();
        for (signature, count) in delta {
            let slot = counts.entry(signature).or_insert(0);
            *slot = slot.saturating_add(count);
        }
    }

    /// Run one flush cycle now: drain the counter and merge the delta into
    /// the partition for the current local calendar day.
    ///
    /// On error the delta is back in the counter before this returns.
    pub fn flush_now(&self) -> Result<FlushOutcome, FlushError> {
        let Some(root) = self.config.ledger_root.as_deref() else {
            return Ok(FlushOutcome::Inert);
        };

        let _cycle = self.flush_gate.lock();
        let delta = self.drain();
        if delta.is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let now = chrono::Local::now();
        match ledger::merge_into_partition(root, &now, &delta) {
            Ok(report) => Ok(FlushOutcome::Flushed(report)),
            Err(err) => {
                self.restore(delta);
                Err(err)
            }
        }
    }

    /// Start the background flush scheduler.
    ///
    /// Returns `None` when no ledger root is configured: the sink stays
    /// inert and no timer work is scheduled at all. Otherwise a single task
    /// ticks at the configured interval; an empty counter makes the tick a
    /// no-op with zero filesystem work, and a failed cycle is logged and
    /// retried next tick with the retained delta. The blocking
    /// read-merge-write runs off the async worker threads.
    pub fn spawn_flusher(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        self.config.ledger_root.as_ref()?;

        let sink = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sink.config.flush_interval);
            // A flush that overlaps the next tick swallows it; the following
            // cycle just sees the larger accumulated delta.
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if sink.is_empty() {
                    tracing::debug!("flush tick: no observations to persist");
                    continue;
                }

                let worker = Arc::clone(&sink);
                match tokio::task::spawn_blocking(move || worker.flush_now()).await {
                    Ok(Ok(FlushOutcome::Flushed(report))) => {
                        tracing::info!(
                            partition = %report.partition.display(),
                            records = report.records,
                            merged = report.merged_signatures,
                            "flushed telemetry delta"
                        );
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        tracing::warn!(
                            error = %err,
                            "flush cycle failed; delta retained for next tick"
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "flush task failed to join");
                    }
                }
            }
        }))
    }
}
