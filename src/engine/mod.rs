//! The feed engine: day loop, frontier loop, multi-stream merge,
//! backpressure gate, termination.

pub mod run;
pub mod state;

use crate::bridge::BoundedBridge;
use crate::calendar::MarketCalendar;
use crate::error::FeedError;
use crate::reader::SubscriptionReader;
use crate::types::resolution::Resolution;
use crate::types::subscription::SubscriptionConfig;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use state::SubscriptionState;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

/// Tunables recognized by the engine.
#[derive(Clone, Debug)]
pub struct FeedEngineConfig {
    /// Total queued batches across all bridges; split evenly per stream.
    pub total_bridge_max: usize,
    /// Sleep interval of the backpressure gate.
    pub backpressure_poll: std::time::Duration,
    /// Sleep interval of the termination drain.
    pub termination_poll: std::time::Duration,
}

impl Default for FeedEngineConfig {
    fn default() -> Self {
        FeedEngineConfig {
            total_bridge_max: 500_000,
            backpressure_poll: std::time::Duration::from_millis(5),
            termination_poll: std::time::Duration::from_millis(100),
        }
    }
}

/// The cross-thread-visible state: single-writer (the run loop), read by
/// the control surface and, for `end_of_bridge`/`loaded_data_frontier`, by
/// the consumer. Plain atomics/a mutex suffice — there is exactly one
/// writer per field.
pub struct EngineFlags {
    pub exit_requested: AtomicBool,
    pub is_active: AtomicBool,
    pub loading_complete: AtomicBool,
    pub end_of_streams: AtomicBool,
    pub end_of_bridge: Vec<AtomicBool>,
    pub loaded_data_frontier: Mutex<DateTime<Utc>>,
}

impl EngineFlags {
    pub(crate) fn new(count: usize, start: DateTime<Utc>) -> Self {
        EngineFlags {
            exit_requested: AtomicBool::new(false),
            is_active: AtomicBool::new(true),
            loading_complete: AtomicBool::new(false),
            end_of_streams: AtomicBool::new(false),
            end_of_bridge: (0..count).map(|_| AtomicBool::new(false)).collect(),
            loaded_data_frontier: Mutex::new(start),
        }
    }
}

/// The producer. Constructed once per backtest run via `FeedEngine::new`,
/// which also hands back the shared handles a `ControlSurface` and the
/// consumer need.
pub struct FeedEngine {
    /// Correlates this run's log lines when several engines run side by
    /// side (e.g. one per instrument group in a multi-engine backtest).
    run_id: Uuid,
    subscriptions: Vec<SubscriptionState>,
    calendar: Box<dyn MarketCalendar>,
    bridges: Vec<Arc<BoundedBridge>>,
    flags: Arc<EngineFlags>,
    period_start: DateTime<Utc>,
    period_finish: DateTime<Utc>,
    bar_increment: Duration,
    frontier_increment: Duration,
    config: FeedEngineConfig,
}

impl FeedEngine {
    /// Builds the engine. `subscriptions[i]` and `readers[i]` share index
    /// `i`, which is also the bridge index — this index is the stable
    /// identity consumers use to address a stream for the engine's
    /// lifetime.
    pub fn new(
        subscriptions: Vec<SubscriptionConfig>,
        readers: Vec<Box<dyn SubscriptionReader>>,
        calendar: Box<dyn MarketCalendar>,
        period_start: DateTime<Utc>,
        period_finish: DateTime<Utc>,
        config: FeedEngineConfig,
    ) -> Result<(FeedEngine, Arc<EngineFlags>, Vec<Arc<BoundedBridge>>), FeedError> {
        if subscriptions.is_empty() {
            return Err(FeedError::InvalidConfiguration(
                "at least one subscription is required".into(),
            ));
        }
        if subscriptions.len() != readers.len() {
            return Err(FeedError::InvalidConfiguration(
                "one reader is required per subscription".into(),
            ));
        }
        if period_start >= period_finish {
            return Err(FeedError::InvalidConfiguration(
                "periodStart must be before periodFinish".into(),
            ));
        }

        let per_bridge_max = (config.total_bridge_max / subscriptions.len()).max(1);
        let bridges: Vec<Arc<BoundedBridge>> = (0..subscriptions.len())
            .map(|_| Arc::new(BoundedBridge::new(per_bridge_max)))
            .collect();

        let (bar_increment, frontier_increment) = increments(&subscriptions);

        let flags = Arc::new(EngineFlags::new(subscriptions.len(), period_start));

        let states = subscriptions
            .into_iter()
            .zip(readers.into_iter())
            .map(|(config, reader)| SubscriptionState::new(config, reader))
            .collect();

        let engine = FeedEngine {
            run_id: Uuid::new_v4(),
            subscriptions: states,
            calendar,
            bridges: bridges.clone(),
            flags: flags.clone(),
            period_start,
            period_finish,
            bar_increment,
            frontier_increment,
            config,
        };

        Ok((engine, flags, bridges))
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

/// `barIncrement` is the smallest bar width among non-tick subscriptions
/// (ticks have no natural bar width, so they don't participate);
/// `frontierIncrement` is the same computation but with ticks contributing
/// one millisecond, so the merge frontier advances finely enough for tick
/// streams.
fn increments(subscriptions: &[SubscriptionConfig]) -> (Duration, Duration) {
    let bar_increment = subscriptions
        .iter()
        .filter(|s| !s.resolution.is_tick())
        .map(|s| s.resolution.bar_duration())
        .min()
        .unwrap_or_else(|| Resolution::Minute.bar_duration());

    let frontier_increment = subscriptions
        .iter()
        .map(|s| s.resolution.frontier_duration())
        .min()
        .unwrap_or(bar_increment);

    (bar_increment, frontier_increment)
}
