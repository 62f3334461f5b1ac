//! The external control and observation surface handed to the consumer
//! alongside the bridges. `FeedEngine::new` returns the shared
//! `EngineFlags`/bridge handles directly; `ControlSurface` is a thin,
//! cheaply-cloned wrapper around them so callers don't need to poke at
//! atomics directly.

use crate::bridge::BoundedBridge;
use crate::engine::EngineFlags;
use chrono::{DateTime, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Handed to the backtest algorithm alongside its bridges. Cloning is
/// cheap — every field is a shared handle into the running engine.
#[derive(Clone)]
pub struct ControlSurface {
    flags: Arc<EngineFlags>,
    bridges: Vec<Arc<BoundedBridge>>,
}

impl ControlSurface {
    pub fn new(flags: Arc<EngineFlags>, bridges: Vec<Arc<BoundedBridge>>) -> Self {
        ControlSurface { flags, bridges }
    }

    /// Requests cancellation and purges every bridge. The run loop is only
    /// guaranteed to observe `exit_requested` at its two poll points
    /// (backpressure gate, frontier-loop head) and during the termination
    /// drain, so this does not block until the engine has actually stopped
    /// — poll `is_active` for that.
    pub fn exit(&self) {
        log::info!("exit requested");
        self.flags.exit_requested.store(true, Ordering::Relaxed);
        self.purge_data();
    }

    /// Drops every queued batch without waiting for the consumer to drain
    /// them. Safe to call at any time; a batch already mid-`enqueue` can
    /// race past this and survive, which is acceptable once the caller has
    /// decided to tear the run down.
    pub fn purge_data(&self) {
        for bridge in &self.bridges {
            bridge.clear();
        }
    }

    /// `true` until the run loop has finished its cleanup pass.
    pub fn is_active(&self) -> bool {
        self.flags.is_active.load(Ordering::Acquire)
    }

    /// `true` once `exit` has been called for this run.
    pub fn exit_requested(&self) -> bool {
        self.flags.exit_requested.load(Ordering::Relaxed)
    }

    /// `true` once the day loop has exhausted `periodFinish` and the
    /// engine has moved into its termination drain.
    pub fn loading_complete(&self) -> bool {
        self.flags.loading_complete.load(Ordering::Relaxed)
    }

    /// The most recently processed merge frontier, for progress reporting.
    pub fn loaded_data_frontier(&self) -> DateTime<Utc> {
        *self.flags.loaded_data_frontier.lock()
    }

    /// `true` once stream `index` has no more data to ever offer, for the
    /// current run.
    pub fn end_of_bridge(&self, index: usize) -> bool {
        self.flags.end_of_bridge[index].load(Ordering::Relaxed)
    }

    /// `true` once every stream is retired and every bridge is drained —
    /// the consumer's signal that no more batches will ever arrive.
    pub fn end_of_bridges(&self) -> bool {
        self.flags.end_of_streams.load(Ordering::Relaxed)
            && self.bridges.iter().enumerate().all(|(i, bridge)| bridge.count() == 0 && self.end_of_bridge(i))
    }
}
