//! Scenario tests exercising the assembled `FeedEngine` end to end, using
//! `InMemoryReader` and `StaticSessionCalendar` as stand-ins for real file
//! and calendar collaborators.

use ahash::AHashMap;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use feed_engine::calendar::{DaySession, StaticSessionCalendar, SymbolSession};
use feed_engine::control::ControlSurface;
use feed_engine::engine::{FeedEngine, FeedEngineConfig};
use feed_engine::reader::{InMemoryReader, SubscriptionReader};
use feed_engine::types::data_point::{DataPoint, DataPointPayload, TickPayload};
use feed_engine::types::{Resolution, Symbol, SubscriptionConfig};
use rust_decimal_macros::dec;

/// The engine logs through the `log` facade; wiring a subscriber here lets
/// `RUST_LOG=trace cargo test -- --nocapture` surface it during a scenario
/// run. `try_init` rather than `init` because every test in this binary
/// calls it and a second `init()` in the same process panics.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn weekday_session(open: NaiveTime, close: NaiveTime) -> SymbolSession {
    let day = DaySession { open: Some(open), close: Some(close) };
    SymbolSession {
        timezone: New_York,
        regular: [DaySession::CLOSED, day, day, day, day, day, DaySession::CLOSED],
        pre_market: Duration::zero(),
        post_market: Duration::zero(),
    }
}

fn tick(symbol: &Symbol, time: DateTime<Utc>) -> DataPoint {
    DataPoint::new(time, symbol.clone(), DataPointPayload::Tick(TickPayload { price: dec!(1), volume: dec!(1) }))
}

// S1 — single daily stream, no gaps.
#[tokio::test]
async fn single_daily_stream_delivers_three_batches_in_order() {
    init_logging();
    let symbol = Symbol::new("SPY");
    let calendar = StaticSessionCalendar::new().with_session(
        symbol.clone(),
        weekday_session(NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
    );

    let d1 = Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap();
    let d2 = Utc.with_ymd_and_hms(2013, 5, 2, 0, 0, 0).unwrap();
    let d3 = Utc.with_ymd_and_hms(2013, 5, 3, 0, 0, 0).unwrap();
    let mut days = AHashMap::new();
    days.insert(d1, vec![tick(&symbol, d1)]);
    days.insert(d2, vec![tick(&symbol, d2)]);
    days.insert(d3, vec![tick(&symbol, d3)]);
    let reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(days));

    let config = SubscriptionConfig::new(symbol, Resolution::Daily);
    let period_start = d1;
    let period_finish = Utc.with_ymd_and_hms(2013, 5, 4, 0, 0, 0).unwrap();

    let (engine, flags, bridges) =
        FeedEngine::new(vec![config], vec![reader], Box::new(calendar), period_start, period_finish, FeedEngineConfig::default())
            .expect("valid configuration");

    engine.run().await;

    assert!(!flags.is_active.load(std::sync::atomic::Ordering::Acquire));
    let bridge = &bridges[0];
    let mut times = Vec::new();
    while let Some(batch) = bridge.try_dequeue() {
        assert_eq!(batch.len(), 1);
        times.push(batch[0].time);
    }
    assert_eq!(times, vec![d1, d2, d3]);
}

// S4 — mixed resolutions: minute bars alongside ticks within the same run.
#[tokio::test]
async fn mixed_resolution_streams_each_respect_their_own_cadence() {
    init_logging();
    let minute_symbol = Symbol::new("SPY");
    let tick_symbol = Symbol::new("EURUSD");
    let session = weekday_session(NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    let calendar = StaticSessionCalendar::new()
        .with_session(minute_symbol.clone(), session.clone())
        .with_session(tick_symbol.clone(), session);

    let day = Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap();
    let minute_time = New_York.with_ymd_and_hms(2013, 5, 1, 9, 31, 0).unwrap().with_timezone(&Utc);

    let mut minute_days = AHashMap::new();
    minute_days.insert(day, vec![DataPoint::new(
        minute_time,
        minute_symbol.clone(),
        DataPointPayload::TradeBar(feed_engine::types::data_point::BarPayload {
            open: dec!(100), high: dec!(100), low: dec!(100), close: dec!(100), volume: dec!(1),
        }),
    )]);

    let mut tick_days = AHashMap::new();
    let tick_times: Vec<DateTime<Utc>> = (0..5).map(|i| minute_time + Duration::milliseconds(i * 200)).collect();
    tick_days.insert(day, tick_times.iter().map(|t| tick(&tick_symbol, *t)).collect());

    let minute_reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(minute_days));
    let tick_reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(tick_days));

    let minute_config = SubscriptionConfig::new(minute_symbol, Resolution::Minute);
    let tick_config = SubscriptionConfig::new(tick_symbol, Resolution::Tick);

    let period_start = day;
    let period_finish = Utc.with_ymd_and_hms(2013, 5, 2, 0, 0, 0).unwrap();

    let (engine, _flags, bridges) = FeedEngine::new(
        vec![minute_config, tick_config],
        vec![minute_reader, tick_reader],
        Box::new(calendar),
        period_start,
        period_finish,
        FeedEngineConfig::default(),
    )
    .expect("valid configuration");

    engine.run().await;

    let minute_bridge = &bridges[0];
    let mut minute_count = 0;
    while minute_bridge.try_dequeue().is_some() {
        minute_count += 1;
    }
    assert_eq!(minute_count, 1, "minute stream contributes at most one real bar for its minute");

    let tick_bridge = &bridges[1];
    let mut dequeued_times = Vec::new();
    while let Some(batch) = tick_bridge.try_dequeue() {
        for point in batch {
            dequeued_times.push(point.time);
        }
    }
    assert_eq!(dequeued_times, tick_times, "tick stream preserves its own arrival order and times");
}

// S5 — backpressure: a stalled consumer must not let a bridge exceed capacity,
// and the producer resumes once the consumer drains it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_pauses_when_bridge_is_full_and_resumes_after_dequeue() {
    init_logging();
    let symbol = Symbol::new("SPY");
    let calendar = StaticSessionCalendar::new().with_session(
        symbol.clone(),
        weekday_session(NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
    );

    // 2013-05-01..03 is Wed..Fri, all trading days under the session above.
    let expected_days: Vec<DateTime<Utc>> = (0..3i64)
        .map(|offset| Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap() + Duration::days(offset))
        .collect();
    let mut days = AHashMap::new();
    for date in &expected_days {
        days.insert(*date, vec![tick(&symbol, *date)]);
    }
    let reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(days));
    let config = SubscriptionConfig::new(symbol, Resolution::Daily);

    let period_start = Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap();
    let period_finish = Utc.with_ymd_and_hms(2013, 5, 8, 0, 0, 0).unwrap();

    let mut small_queue = FeedEngineConfig::default();
    small_queue.total_bridge_max = 1;
    small_queue.backpressure_poll = std::time::Duration::from_millis(2);

    let (engine, flags, bridges) =
        FeedEngine::new(vec![config], vec![reader], Box::new(calendar), period_start, period_finish, small_queue)
            .expect("valid configuration");
    let control = ControlSurface::new(flags.clone(), bridges.clone());
    let bridge = bridges[0].clone();

    let handle = tokio::spawn(engine.run());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(bridge.count() <= 1, "bridge must never exceed its configured capacity");

    let mut drained = 0;
    while drained < expected_days.len() {
        if bridge.try_dequeue().is_some() {
            drained += 1;
        }
        assert!(bridge.count() <= 1);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    handle.await.expect("engine task completes");
    assert!(!control.is_active());
}

/// A reader whose `move_next` panics after its first point, paired with a
/// healthy sibling reader — exercises `ReaderFault` recovery: the faulted
/// stream is retired without aborting the run or its siblings.
struct PanicsAfterFirstReader {
    points: Vec<DataPoint>,
    index: usize,
    moved_once: bool,
}

impl SubscriptionReader for PanicsAfterFirstReader {
    fn refresh_source(&mut self, _date: DateTime<Utc>) -> bool {
        self.index = 0;
        self.moved_once = false;
        !self.points.is_empty()
    }

    fn move_next(&mut self) -> bool {
        if !self.moved_once {
            self.moved_once = true;
            panic!("simulated reader fault");
        }
        false
    }

    fn current(&self) -> Option<&DataPoint> {
        self.points.get(self.index)
    }

    fn previous(&self) -> Option<&DataPoint> {
        None
    }

    fn end_of_stream(&self) -> bool {
        false
    }

    fn dispose(&mut self) {}
}

#[tokio::test]
async fn reader_panic_retires_only_the_faulted_stream() {
    init_logging();
    let faulty_symbol = Symbol::new("FAULTY");
    let healthy_symbol = Symbol::new("SPY");
    let session = weekday_session(NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    let calendar = StaticSessionCalendar::new()
        .with_session(faulty_symbol.clone(), session.clone())
        .with_session(healthy_symbol.clone(), session);

    let day = Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap();
    let faulty_reader: Box<dyn SubscriptionReader> = Box::new(PanicsAfterFirstReader {
        points: vec![tick(&faulty_symbol, day)],
        index: 0,
        moved_once: false,
    });

    let mut healthy_days = AHashMap::new();
    healthy_days.insert(day, vec![tick(&healthy_symbol, day)]);
    let healthy_reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(healthy_days));

    let faulty_config = SubscriptionConfig::new(faulty_symbol, Resolution::Daily);
    let healthy_config = SubscriptionConfig::new(healthy_symbol, Resolution::Daily);

    let period_finish = Utc.with_ymd_and_hms(2013, 5, 2, 0, 0, 0).unwrap();
    let (engine, flags, bridges) = FeedEngine::new(
        vec![faulty_config, healthy_config],
        vec![faulty_reader, healthy_reader],
        Box::new(calendar),
        day,
        period_finish,
        FeedEngineConfig::default(),
    )
    .expect("valid configuration");

    engine.run().await;

    assert!(!flags.is_active.load(std::sync::atomic::Ordering::Acquire));
    assert!(flags.end_of_bridge[0].load(std::sync::atomic::Ordering::Relaxed), "faulted stream is retired");
    assert_eq!(bridges[1].try_dequeue().map(|b| b.len()), Some(1), "healthy sibling still delivered its data");
}

// S6 — exit during the frontier loop.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exit_stops_the_engine_and_clears_every_bridge() {
    init_logging();
    let symbol = Symbol::new("EURUSD");
    let calendar = StaticSessionCalendar::new().with_session(
        symbol.clone(),
        weekday_session(NaiveTime::from_hms_opt(0, 0, 0).unwrap(), NaiveTime::from_hms_opt(23, 59, 59).unwrap()),
    );

    let day = Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap();
    let points: Vec<DataPoint> = (0..200_000i64).map(|i| tick(&symbol, day + Duration::milliseconds(i))).collect();
    let mut days = AHashMap::new();
    days.insert(day, points);
    let reader: Box<dyn SubscriptionReader> = Box::new(InMemoryReader::new(days));
    let config = SubscriptionConfig::new(symbol, Resolution::Tick);

    let period_finish = Utc.with_ymd_and_hms(2013, 5, 2, 0, 0, 0).unwrap();
    let (engine, flags, bridges) =
        FeedEngine::new(vec![config], vec![reader], Box::new(calendar), day, period_finish, FeedEngineConfig::default())
            .expect("valid configuration");
    let control = ControlSurface::new(flags.clone(), bridges.clone());

    let handle = tokio::spawn(engine.run());
    tokio::time::sleep(std::time::Duration::from_micros(200)).await;
    control.exit();

    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("engine stops within one second of exit")
        .expect("engine task does not panic");

    assert!(!control.is_active());
    // purge_data races with at most one in-flight enqueue per bridge: the
    // producer can observe exit_requested only at the top of its next loop
    // iteration, so a batch mid-enqueue when purge_data runs can still land
    // afterwards. One residual batch per bridge is the accepted cost of a
    // non-blocking purge; anything beyond that would mean purge_data isn't
    // actually cutting the producer off.
    for bridge in &bridges {
        assert!(bridge.count() <= 1, "purge_data must leave at most one racing batch per bridge");
    }
}
