//! Synthesizes fill-forward bars across data gaps. Invoked once per
//! stream at the end of every frontier step.

use crate::bridge::BoundedBridge;
use crate::calendar::MarketCalendar;
use crate::reader::SubscriptionReader;
use crate::types::subscription::SubscriptionConfig;
use chrono::{DateTime, Duration, Utc};

/// Fills the gap between a stream's `fill_forward_frontier` and its
/// reader's current point (or, on premature end-of-stream, until market
/// close) with synthetic bars cloned from the last known point.
///
/// `fill_forward_frontier` is `None` until the first bar is known, marking
/// that no synthetic bar has been emitted yet.
///
/// Closed-hours skipping in the gap-between-points case (Regime B) is
/// implemented as a direct per-step calendar check: querying the calendar
/// at each candidate time and skipping emission when it's closed, rather
/// than jumping ahead and rewinding by decrement — a rewind can re-land on
/// the same closed instant it started from and never terminate. See
/// DESIGN.md for the full rationale.
pub fn synthesize(
    reader: &dyn SubscriptionReader,
    config: &SubscriptionConfig,
    calendar: &dyn MarketCalendar,
    bridge: &BoundedBridge,
    fill_forward_frontier: &mut Option<DateTime<Utc>>,
    bar_increment: Duration,
) {
    if !config.fill_data_forward {
        return;
    }
    let Some(previous) = reader.previous() else {
        return;
    };

    let mut frontier = fill_forward_frontier.unwrap_or(previous.time);

    if reader.end_of_stream() {
        // Regime A: no more known future points, fill until market close.
        if let Some(current) = reader.current() {
            let mut date = frontier + bar_increment;
            while calendar.market_open(&config.symbol, date) {
                bridge.enqueue(vec![current.cloned_at(date)]);
                frontier = date;
                date += bar_increment;
            }
        }
        *fill_forward_frontier = Some(frontier);
        return;
    }

    // Regime B: fill the gap up to the next known real point.
    let Some(current) = reader.current() else {
        *fill_forward_frontier = Some(frontier);
        return;
    };
    let mut date = frontier + bar_increment;
    while date < current.time {
        let is_open = if config.extended_market_hours {
            calendar.extended_market_open(&config.symbol, date)
        } else {
            calendar.market_open(&config.symbol, date)
        };
        if is_open {
            bridge.enqueue(vec![previous.cloned_at(date)]);
            frontier = date;
        }
        date += bar_increment;
    }
    *fill_forward_frontier = Some(frontier);
}
