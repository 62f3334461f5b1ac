use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The granularity of a subscription's data points.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// The bar width used by the fill-forward synthesizer and the engine's
    /// `barIncrement`. Ticks have no natural bar width; callers that need a
    /// value for ticks fall back to `frontier_increment`.
    pub fn bar_duration(&self) -> Duration {
        match self {
            Resolution::Tick => Duration::zero(),
            Resolution::Second => Duration::seconds(1),
            Resolution::Minute => Duration::minutes(1),
            Resolution::Hour => Duration::hours(1),
            Resolution::Daily => Duration::days(1),
        }
    }

    /// The frontier-step width this resolution should contribute. Ticks
    /// advance the merge frontier at millisecond granularity so tick
    /// streams are never starved behind a minute-wide step.
    pub fn frontier_duration(&self) -> Duration {
        match self {
            Resolution::Tick => Duration::milliseconds(1),
            _ => self.bar_duration(),
        }
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, Resolution::Tick)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Tick => write!(f, "Tick"),
            Resolution::Second => write!(f, "Second"),
            Resolution::Minute => write!(f, "Minute"),
            Resolution::Hour => write!(f, "Hour"),
            Resolution::Daily => write!(f, "Daily"),
        }
    }
}
