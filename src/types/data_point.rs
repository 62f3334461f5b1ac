use crate::types::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single trade print.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct TickPayload {
    pub price: Decimal,
    pub volume: Decimal,
}

/// An OHLCV bar produced by a time-series resolution.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct BarPayload {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A bid/ask bar, for subscriptions that carry quote-side data.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct QuoteBarPayload {
    pub bid_open: Decimal,
    pub bid_high: Decimal,
    pub bid_low: Decimal,
    pub bid_close: Decimal,
    pub ask_open: Decimal,
    pub ask_high: Decimal,
    pub ask_low: Decimal,
    pub ask_close: Decimal,
}

/// Any other vendor- or strategy-defined point. Held opaque so readers for
/// data the engine doesn't natively model can still participate in the
/// merge.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct CustomPayload {
    pub value: Decimal,
}

/// The base record produced by a reader, tagged by payload rather than
/// represented as a trait object so cloning (needed by fill-forward) stays
/// plain data rather than dynamic dispatch.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub enum DataPointPayload {
    Tick(TickPayload),
    TradeBar(BarPayload),
    QuoteBar(QuoteBarPayload),
    Custom(CustomPayload),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub payload: DataPointPayload,
}

impl DataPoint {
    pub fn new(time: DateTime<Utc>, symbol: Symbol, payload: DataPointPayload) -> Self {
        DataPoint { time, symbol, payload }
    }

    /// Deep-clones this point, stamping it with a new time. Used by
    /// fill-forward to synthesize bars between two real points — the
    /// payload is reproduced verbatim, only `time` changes.
    pub fn cloned_at(&self, time: DateTime<Utc>) -> DataPoint {
        DataPoint {
            time,
            symbol: self.symbol.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.symbol, self.time)
    }
}

/// An ordered run of data points sharing a frontier window; the unit a
/// bridge enqueues and dequeues.
pub type Batch = Vec<DataPoint>;
