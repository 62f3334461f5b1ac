use super::FeedEngine;
use crate::error::FeedError;
use crate::fill_forward;
use chrono::{DateTime, Duration, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;

impl FeedEngine {
    /// Drives the engine to completion: one tradeable day at a time, a
    /// frontier loop within each day, a termination drain, then cleanup.
    /// Consumes `self` — this is meant to be the body of a single spawned
    /// task.
    pub async fn run(mut self) {
        log::info!(
            "feed engine {} starting: {} subscriptions, {} .. {}",
            self.run_id, self.subscriptions.len(), self.period_start, self.period_finish,
        );

        let symbols: Vec<_> = self.subscriptions.iter().map(|s| s.config.symbol.clone()).collect();
        let days = self
            .calendar
            .tradeable_days(&symbols, self.period_start, self.period_finish);

        'day_loop: for date in days {
            if self.flags.exit_requested.load(Ordering::Relaxed) {
                break;
            }

            log::debug!("rotating to {}", date.date_naive());
            let mut frontier = date + self.frontier_increment;
            for i in 0..self.subscriptions.len() {
                // A reader that has ever faulted stays retired for the rest of the
                // run — a panic mid-method leaves no reliable state to resume from.
                if self.subscriptions[i].faulted {
                    self.flags.end_of_bridge[i].store(true, Ordering::Relaxed);
                    continue;
                }
                let opened = self.guarded_refresh_source(i, date);
                self.flags.end_of_bridge[i].store(!opened, Ordering::Relaxed);
                if !opened {
                    let err = FeedError::SourceMissing {
                        symbol: self.subscriptions[i].config.symbol.clone(),
                        date,
                    };
                    log::trace!("{}", err);
                }
            }

            self.backpressure_gate().await;

            while (frontier.date_naive() == date.date_naive() || frontier == date + Duration::days(1))
                && !self.flags.exit_requested.load(Ordering::Relaxed)
            {
                // (a) retire streams that are exhausted, faulted, or already retired.
                let mut any_active = false;
                for i in 0..self.subscriptions.len() {
                    let retired = self.subscriptions[i].reader.end_of_stream()
                        || self.subscriptions[i].faulted
                        || self.flags.end_of_bridge[i].load(Ordering::Relaxed);
                    if retired {
                        self.flags.end_of_bridge[i].store(true, Ordering::Relaxed);
                    } else {
                        any_active = true;
                    }
                }
                if !any_active {
                    frontier = date + Duration::days(1);
                    break;
                }

                // (b)-(d) drain each active stream up to the frontier, fill forward, enqueue.
                let mut early_bird_millis: Option<i64> = None;
                for i in 0..self.subscriptions.len() {
                    if self.flags.end_of_bridge[i].load(Ordering::Relaxed) {
                        continue;
                    }

                    let mut cache = Vec::new();
                    loop {
                        let should_take = match self.subscriptions[i].reader.current() {
                            Some(point) => point.time < frontier,
                            None => false,
                        };
                        if !should_take {
                            break;
                        }
                        cache.push(self.subscriptions[i].reader.current().unwrap().clone());
                        if !self.guarded_move_next(i) {
                            break;
                        }
                    }

                    if !cache.is_empty() {
                        self.subscriptions[i].fill_forward_frontier = Some(cache[0].time);
                        self.bridges[i].enqueue(cache);
                    }

                    let state = &mut self.subscriptions[i];
                    fill_forward::synthesize(
                        state.reader.as_ref(),
                        &state.config,
                        self.calendar.as_ref(),
                        &self.bridges[i],
                        &mut state.fill_forward_frontier,
                        self.bar_increment,
                    );

                    if let Some(point) = self.subscriptions[i].reader.current() {
                        let millis = point.time.timestamp_millis();
                        early_bird_millis = Some(match early_bird_millis {
                            Some(current_min) => current_min.min(millis),
                            None => millis,
                        });
                    }
                }

                *self.flags.loaded_data_frontier.lock() = frontier;

                frontier = advance_frontier(frontier, early_bird_millis, self.frontier_increment);
            }

            if self.flags.exit_requested.load(Ordering::Relaxed) {
                break 'day_loop;
            }
        }

        self.flags.loading_complete.store(true, Ordering::Relaxed);
        log::debug!("loading complete, draining bridges");
        self.termination_drain().await;

        for state in self.subscriptions.iter_mut() {
            let symbol = state.config.symbol.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| state.reader.dispose())).is_err() {
                log::trace!("{}", FeedError::ReaderFault { symbol, detail: "panic in dispose".into() });
            }
        }
        self.flags.is_active.store(false, Ordering::Release);
        log::info!("feed engine {} stopped", self.run_id);
    }

    /// Calls `refresh_source`, catching a reader panic as a `ReaderFault`
    /// rather than letting it tear down the whole engine — the stream is
    /// retired and its siblings continue.
    fn guarded_refresh_source(&mut self, i: usize, date: DateTime<Utc>) -> bool {
        let symbol = self.subscriptions[i].config.symbol.clone();
        let reader = &mut self.subscriptions[i].reader;
        match panic::catch_unwind(AssertUnwindSafe(|| reader.refresh_source(date))) {
            Ok(opened) => opened,
            Err(_) => {
                log::trace!("{}", FeedError::ReaderFault { symbol, detail: "panic in refresh_source".into() });
                self.subscriptions[i].faulted = true;
                false
            }
        }
    }

    /// As `guarded_refresh_source`, for `move_next`.
    fn guarded_move_next(&mut self, i: usize) -> bool {
        let symbol = self.subscriptions[i].config.symbol.clone();
        let reader = &mut self.subscriptions[i].reader;
        match panic::catch_unwind(AssertUnwindSafe(|| reader.move_next())) {
            Ok(advanced) => advanced,
            Err(_) => {
                log::trace!("{}", FeedError::ReaderFault { symbol, detail: "panic in move_next".into() });
                self.subscriptions[i].faulted = true;
                false
            }
        }
    }

    /// Pauses the producer only when every inactive stream's bridge is
    /// already empty yet some active bridge is full — i.e. the consumer is
    /// genuinely behind, not merely starving an idle stream.
    async fn backpressure_gate(&self) {
        loop {
            if self.flags.exit_requested.load(Ordering::Relaxed) {
                return;
            }
            let n = self.subscriptions.len();
            let full = (0..n).filter(|&i| self.bridges[i].is_full()).count();
            let empty = (0..n).filter(|&i| self.bridges[i].count() == 0).count();
            let active = (0..n)
                .filter(|&i| !self.flags.end_of_bridge[i].load(Ordering::Relaxed))
                .count();
            if full > 0 && (n - active) == empty {
                log::debug!("backpressure: {full} bridge(s) full, pausing");
                tokio::time::sleep(self.config.backpressure_poll).await;
                continue;
            }
            return;
        }
    }

    async fn termination_drain(&mut self) {
        while !self.all_bridges_drained() && !self.flags.exit_requested.load(Ordering::Relaxed) {
            let mut any_active = false;
            for i in 0..self.subscriptions.len() {
                if self.bridges[i].count() == 0 && self.subscriptions[i].reader.end_of_stream() {
                    self.flags.end_of_bridge[i].store(true, Ordering::Relaxed);
                }
                if !self.flags.end_of_bridge[i].load(Ordering::Relaxed) {
                    any_active = true;
                }
            }
            if !any_active {
                self.flags.end_of_streams.store(true, Ordering::Relaxed);
            }
            if self.all_bridges_drained() {
                break;
            }
            tokio::time::sleep(self.config.termination_poll).await;
        }
    }

    /// `endOfBridges`: every bridge is empty, every stream is retired, and
    /// `endOfStreams` has latched.
    fn all_bridges_drained(&self) -> bool {
        if !self.flags.end_of_streams.load(Ordering::Relaxed) {
            return false;
        }
        (0..self.subscriptions.len()).all(|i| {
            self.bridges[i].count() == 0 && self.flags.end_of_bridge[i].load(Ordering::Relaxed)
        })
    }
}

/// Advances the frontier by `frontier_increment`, unless a stream already
/// has a real point beyond the current frontier — in which case the
/// frontier jumps straight to just past that point instead of stepping
/// through the gap one increment at a time.
fn advance_frontier(frontier: DateTime<Utc>, early_bird_millis: Option<i64>, frontier_increment: Duration) -> DateTime<Utc> {
    if let Some(millis) = early_bird_millis {
        if millis > 0 && millis > frontier.timestamp_millis() {
            let early = DateTime::<Utc>::from_timestamp_millis(millis).expect("valid timestamp");
            return round_down(early, frontier_increment) + frontier_increment;
        }
    }
    frontier + frontier_increment
}

fn round_down(time: DateTime<Utc>, increment: Duration) -> DateTime<Utc> {
    let step = increment.num_milliseconds().max(1);
    let floored = (time.timestamp_millis() / step) * step;
    DateTime::<Utc>::from_timestamp_millis(floored).expect("valid timestamp")
}
