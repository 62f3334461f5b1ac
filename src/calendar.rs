//! The market calendar / trading-hours oracle. Real exchange calendars are
//! a host-application concern — this module defines the collaborator
//! interface the engine consumes, plus a small reference implementation
//! (`StaticSessionCalendar`) used by the tests and available as a
//! drop-in default for simple fixed-session instruments.

use crate::types::symbol::Symbol;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use dashmap::DashMap;

/// Enumerates tradeable dates and answers market/extended-hours queries
/// for a symbol. Implementations are free to source this however they
/// like (static tables, a holiday calendar service, vendor metadata); the
/// engine treats it as a pure oracle with no state of its own.
pub trait MarketCalendar: Send + Sync {
    /// Ascending, finite sequence of dates on which at least one
    /// subscribed security trades, within `[start, finish]` inclusive.
    fn tradeable_days(
        &self,
        symbols: &[Symbol],
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>>;

    /// Regular trading hours open at `time` for `symbol`.
    fn market_open(&self, symbol: &Symbol, time: DateTime<Utc>) -> bool;

    /// Regular + pre/post session hours open at `time` for `symbol`.
    fn extended_market_open(&self, symbol: &Symbol, time: DateTime<Utc>) -> bool;
}

/// One session window, in the instrument's local time. `None` on either
/// side means "no session that day".
#[derive(Clone, Copy, Debug)]
pub struct DaySession {
    pub open: Option<NaiveTime>,
    pub close: Option<NaiveTime>,
}

impl DaySession {
    pub const CLOSED: DaySession = DaySession { open: None, close: None };

    /// The close edge is inclusive: the instant the session closes is
    /// still considered open, so a fill-forward run that reaches exactly
    /// the close still emits that last bar.
    fn is_trading_time(&self, time: NaiveTime) -> bool {
        match (self.open, self.close) {
            (Some(open), Some(close)) if close > open => time >= open && time <= close,
            (Some(open), Some(close)) => time >= open || time <= close,
            (Some(open), None) => time >= open,
            (None, Some(close)) => time <= close,
            (None, None) => false,
        }
    }
}

/// A symbol's fixed weekly trading schedule: regular hours plus a
/// pre/post-market extension applied symmetrically around the regular
/// session when extended hours are requested.
#[derive(Clone, Debug)]
pub struct SymbolSession {
    pub timezone: Tz,
    pub regular: [DaySession; 7],
    pub pre_market: Duration,
    pub post_market: Duration,
}

impl SymbolSession {
    pub fn regular_session(timezone: Tz, weekday_open_close: [DaySession; 7]) -> Self {
        SymbolSession {
            timezone,
            regular: weekday_open_close,
            pre_market: Duration::zero(),
            post_market: Duration::zero(),
        }
    }

    fn session_for(&self, weekday: Weekday) -> DaySession {
        self.regular[weekday.num_days_from_sunday() as usize]
    }

    fn is_open(&self, at: DateTime<Utc>, extended: bool) -> bool {
        let local = at.with_timezone(&self.timezone);
        let session = self.session_for(local.weekday());
        if !extended {
            return session.is_trading_time(local.time());
        }
        let widened = DaySession {
            open: session.open.map(|o| subtract_duration(o, self.pre_market)),
            close: session.close.map(|c| add_duration(c, self.post_market)),
        };
        widened.is_trading_time(local.time())
    }
}

fn subtract_duration(time: NaiveTime, duration: Duration) -> NaiveTime {
    time - duration
}

fn add_duration(time: NaiveTime, duration: Duration) -> NaiveTime {
    time + duration
}

/// A reference `MarketCalendar` built from per-symbol fixed weekly
/// sessions. Weekends with no configured session are naturally closed.
/// Sessions are kept in a `DashMap` rather than a plain map so a calendar
/// can be registered once and shared across runs while new symbols are
/// added from other threads (e.g. a vendor-metadata poller) without an
/// external lock.
#[derive(Clone, Default)]
pub struct StaticSessionCalendar {
    sessions: DashMap<Symbol, SymbolSession>,
}

impl StaticSessionCalendar {
    pub fn new() -> Self {
        StaticSessionCalendar { sessions: DashMap::new() }
    }

    pub fn with_session(self, symbol: Symbol, session: SymbolSession) -> Self {
        self.sessions.insert(symbol, session);
        self
    }

    fn session(&self, symbol: &Symbol) -> Option<SymbolSession> {
        self.sessions.get(symbol).map(|entry| entry.value().clone())
    }
}

impl MarketCalendar for StaticSessionCalendar {
    fn tradeable_days(
        &self,
        symbols: &[Symbol],
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let mut days = Vec::new();
        let mut cursor = start.date_naive().and_hms_opt(0, 0, 0).unwrap();
        let finish_date = finish.date_naive();
        while cursor.date() <= finish_date {
            let day = Utc.from_utc_datetime(&cursor);
            let any_open = symbols.iter().any(|symbol| {
                self.session(symbol)
                    .map(|session| session.session_for(day.weekday()).open.is_some())
                    .unwrap_or(false)
            });
            if any_open {
                days.push(day);
            }
            cursor += Duration::days(1);
        }
        days
    }

    fn market_open(&self, symbol: &Symbol, time: DateTime<Utc>) -> bool {
        self.session(symbol).map(|s| s.is_open(time, false)).unwrap_or(false)
    }

    fn extended_market_open(&self, symbol: &Symbol, time: DateTime<Utc>) -> bool {
        self.session(symbol).map(|s| s.is_open(time, true)).unwrap_or(false)
    }
}
