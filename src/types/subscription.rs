use crate::types::resolution::Resolution;
use crate::types::symbol::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable request for one symbol's data at one resolution.
///
/// `source_locator` is whatever opaque detail the reader needs to find its
/// files for this subscription (vendor, dataset path prefix, etc) — the
/// engine never interprets it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct SubscriptionConfig {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub fill_data_forward: bool,
    pub extended_market_hours: bool,
    pub source_locator: String,
}

impl SubscriptionConfig {
    pub fn new(symbol: Symbol, resolution: Resolution) -> Self {
        SubscriptionConfig {
            symbol,
            resolution,
            fill_data_forward: false,
            extended_market_hours: false,
            source_locator: String::new(),
        }
    }

    pub fn with_fill_forward(mut self, fill_data_forward: bool) -> Self {
        self.fill_data_forward = fill_data_forward;
        self
    }

    pub fn with_extended_market_hours(mut self, extended_market_hours: bool) -> Self {
        self.extended_market_hours = extended_market_hours;
        self
    }

    pub fn with_source_locator(mut self, source_locator: impl Into<String>) -> Self {
        self.source_locator = source_locator.into();
        self
    }
}

impl fmt::Display for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.resolution)
    }
}
