//! The file-format boundary. Parsing and decompression of the actual
//! source files are out of scope for this crate — readers are supplied by
//! the host application. This module defines the contract the engine
//! drives, plus `InMemoryReader`, a reference implementation used by the
//! test suite that stands in for a real file-backed reader.

use crate::types::data_point::DataPoint;
use ahash::AHashMap;
use chrono::{DateTime, Utc};

/// Per-subscription cursor over time-ordered data points for one day at a
/// time. Implementations must guarantee non-decreasing `time` within a day
/// and across day rotations.
pub trait SubscriptionReader: Send {
    /// Locate and open the source for `date`. Returns `true` if a source
    /// exists and the first point is available (`current()` is then
    /// `Some`); `false` if this stream has no data for the day (a missing
    /// file, a holiday the reader itself filters). A `false` return is
    /// never fatal — the engine marks the stream end-of-bridge for the day
    /// and retries on the next tradeable day.
    fn refresh_source(&mut self, date: DateTime<Utc>) -> bool;

    /// Advance the cursor. On success, the prior `current()` becomes
    /// `previous()` and a new point becomes `current()`. On failure,
    /// `end_of_stream()` latches true.
    fn move_next(&mut self) -> bool;

    fn current(&self) -> Option<&DataPoint>;
    fn previous(&self) -> Option<&DataPoint>;

    /// True once this reader has no more data, ever.
    fn end_of_stream(&self) -> bool;

    /// Release file handles / sockets. Called unconditionally during
    /// engine cleanup, on every exit path.
    fn dispose(&mut self);
}

/// A reference reader backed by a caller-supplied `{date -> points}` map,
/// used by the engine's own test suite in place of a real file reader.
/// Days are looked up by their UTC calendar date; points for a day must
/// already be in non-decreasing time order.
pub struct InMemoryReader {
    days: AHashMap<DateTime<Utc>, Vec<DataPoint>>,
    cursor: Vec<DataPoint>,
    index: usize,
    current: Option<DataPoint>,
    previous: Option<DataPoint>,
    end_of_stream: bool,
    disposed: bool,
}

impl InMemoryReader {
    pub fn new(days: AHashMap<DateTime<Utc>, Vec<DataPoint>>) -> Self {
        InMemoryReader {
            days,
            cursor: Vec::new(),
            index: 0,
            current: None,
            previous: None,
            end_of_stream: false,
            disposed: false,
        }
    }
}

impl SubscriptionReader for InMemoryReader {
    fn refresh_source(&mut self, date: DateTime<Utc>) -> bool {
        self.end_of_stream = false;
        let day_key = date.date_naive();
        let points = self
            .days
            .iter()
            .find(|(d, _)| d.date_naive() == day_key)
            .map(|(_, points)| points.clone());

        match points {
            Some(points) if !points.is_empty() => {
                self.cursor = points;
                self.index = 0;
                self.previous = None;
                self.current = Some(self.cursor[0].clone());
                true
            }
            _ => {
                self.cursor.clear();
                self.index = 0;
                self.current = None;
                false
            }
        }
    }

    fn move_next(&mut self) -> bool {
        if self.index + 1 >= self.cursor.len() {
            self.end_of_stream = true;
            return false;
        }
        self.previous = self.current.take();
        self.index += 1;
        self.current = Some(self.cursor[self.index].clone());
        true
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn previous(&self) -> Option<&DataPoint> {
        self.previous.as_ref()
    }

    fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.cursor.clear();
    }
}
