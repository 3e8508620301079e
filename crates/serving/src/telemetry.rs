//! In-memory telemetry for the prediction path
//!
//! One day-scoped state behind a single lock. Every write (rollover check,
//! counter, ring pushes, statistics) happens inside one critical section, so
//! concurrent requests never interleave a rollover with a push. Readers get
//! copies taken under the read lock.
//!
//! Nothing here is persisted; a restart starts from an empty state.

use crate::config::TelemetryConfig;
use crate::prediction::PredictionResult;
use chrono::{Local, NaiveDate, NaiveDateTime};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Wall-clock source; local time decides the day boundary.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Operational,
    Degraded,
}

/// A served prediction as shown in the live feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedRecord {
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Consistent point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetrySnapshot {
    pub day: NaiveDate,
    pub predictions_today: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate_window: f64,
    pub status: ServiceStatus,
    pub latency_samples: usize,
    pub feed_len: usize,
}

#[derive(Debug)]
struct TelemetryState {
    day: NaiveDate,
    predictions_today: u64,
    latencies: VecDeque<f64>,
    feed: VecDeque<FeedRecord>,
    /// `true` marks a failed request
    outcomes: VecDeque<bool>,
    avg_latency_ms: f64,
    p95_latency_ms: f64,
    status: ServiceStatus,
}

impl TelemetryState {
    fn new(day: NaiveDate, config: &TelemetryConfig) -> Self {
        Self {
            day,
            predictions_today: 0,
            latencies: VecDeque::with_capacity(config.latency_capacity),
            feed: VecDeque::with_capacity(config.feed_capacity),
            outcomes: VecDeque::with_capacity(config.error_window),
            avg_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            status: ServiceStatus::Operational,
        }
    }

    fn push_outcome(&mut self, failed: bool, capacity: usize) {
        self.outcomes.push_back(failed);
        while self.outcomes.len() > capacity {
            self.outcomes.pop_front();
        }
    }

    fn recompute_latency_stats(&mut self) {
        self.avg_latency_ms = mean(&self.latencies);
        self.p95_latency_ms = p95(&self.latencies);
    }

    fn error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|failed| **failed).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

fn mean(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// Rank-based 95th percentile: the sample at rank ⌈0.95·n⌉ of the sorted buffer
fn p95(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = samples.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let rank = (0.95 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug)]
pub struct TelemetryRecorder {
    config: TelemetryConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<TelemetryState>,
}

impl TelemetryRecorder {
    pub fn new(config: TelemetryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TelemetryConfig, clock: Arc<dyn Clock>) -> Self {
        let state = TelemetryState::new(clock.now().date(), &config);
        Self {
            config,
            clock,
            state: RwLock::new(state),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Record one completed prediction
    pub fn record_prediction(&self, result: &PredictionResult) {
        let latency = result.latency_ms.max(0.0);

        let mut state = self.state.write();
        // read under the lock so feed timestamps follow lock order
        let now = self.clock.now();

        let today = now.date();
        if today != state.day {
            info!(
                previous = %state.day,
                current = %today,
                served = state.predictions_today,
                "Telemetry day rollover"
            );
            state.day = today;
            state.predictions_today = 0;
            state.latencies.clear();
        }

        state.predictions_today += 1;

        state.latencies.push_back(latency);
        while state.latencies.len() > self.config.latency_capacity {
            state.latencies.pop_front();
        }

        state.feed.push_front(FeedRecord {
            timestamp: now,
            result: PredictionResult {
                latency_ms: latency,
                ..result.clone()
            },
        });
        state.feed.truncate(self.config.feed_capacity);

        state.push_outcome(false, self.config.error_window);
        state.recompute_latency_stats();
        state.status = ServiceStatus::Operational;
    }

    /// Record a request that failed after validation
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.push_outcome(true, self.config.error_window);
        state.status = ServiceStatus::Degraded;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let state = self.state.read();
        TelemetrySnapshot {
            day: state.day,
            predictions_today: state.predictions_today,
            avg_latency_ms: state.avg_latency_ms,
            p95_latency_ms: state.p95_latency_ms,
            error_rate_window: state.error_rate(),
            status: state.status,
            latency_samples: state.latencies.len(),
            feed_len: state.feed.len(),
        }
    }

    /// Up to `limit` most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<FeedRecord> {
        self.state.read().feed.iter().take(limit).cloned().collect()
    }

    pub fn status(&self) -> ServiceStatus {
        self.state.read().status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn result(id: &str, latency_ms: f64) -> PredictionResult {
        PredictionResult {
            model_id: id.to_string(),
            model_name: id.to_string(),
            prediction: 1,
            probabilities: Some([0.2, 0.8]),
            confidence: Some(0.8),
            latency_ms,
        }
    }

    fn recorder(config: TelemetryConfig) -> (Arc<ManualClock>, TelemetryRecorder) {
        let clock = Arc::new(ManualClock::new(at(1, 9)));
        let recorder = TelemetryRecorder::with_clock(config, clock.clone());
        (clock, recorder)
    }

    #[test]
    fn test_p95_is_rank_based() {
        let samples: VecDeque<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(p95(&samples), 19.0);

        let samples: VecDeque<f64> = VecDeque::from(vec![5.0]);
        assert_eq!(p95(&samples), 5.0);
        assert_eq!(p95(&VecDeque::new()), 0.0);

        let samples: VecDeque<f64> = (1..=100).rev().map(f64::from).collect();
        assert_eq!(p95(&samples), 95.0);
    }

    #[test]
    fn test_stats_follow_writes() {
        let (_, recorder) = recorder(TelemetryConfig::default());
        recorder.record_prediction(&result("m", 2.0));
        recorder.record_prediction(&result("m", 4.0));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.predictions_today, 2);
        assert_eq!(snapshot.avg_latency_ms, 3.0);
        assert_eq!(snapshot.p95_latency_ms, 4.0);
        assert_eq!(snapshot.status, ServiceStatus::Operational);
    }

    #[test]
    fn test_day_rollover_keeps_feed() {
        let (clock, recorder) = recorder(TelemetryConfig::default());
        for i in 0..5 {
            recorder.record_prediction(&result(&format!("m{i}"), 10.0));
        }

        clock.set(at(2, 0));
        recorder.record_prediction(&result("fresh", 1.5));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.day, at(2, 0).date());
        assert_eq!(snapshot.predictions_today, 1);
        assert_eq!(snapshot.latency_samples, 1);
        assert_eq!(snapshot.avg_latency_ms, 1.5);
        assert_eq!(snapshot.feed_len, 6);
        assert_eq!(recorder.recent(1)[0].result.model_id, "fresh");
    }

    #[test]
    fn test_reads_do_not_roll_over() {
        let (clock, recorder) = recorder(TelemetryConfig::default());
        recorder.record_prediction(&result("m", 1.0));
        clock.set(at(5, 12));
        assert_eq!(recorder.snapshot().predictions_today, 1);
    }

    #[test]
    fn test_error_window() {
        let config = TelemetryConfig {
            error_window: 4,
            ..TelemetryConfig::default()
        };
        let (_, recorder) = recorder(config);
        recorder.record_failure();
        assert_eq!(recorder.snapshot().error_rate_window, 1.0);
        assert_eq!(recorder.status(), ServiceStatus::Degraded);

        for _ in 0..3 {
            recorder.record_prediction(&result("m", 1.0));
        }
        assert_eq!(recorder.snapshot().error_rate_window, 0.25);

        // the failure slides out of the window
        recorder.record_prediction(&result("m", 1.0));
        assert_eq!(recorder.snapshot().error_rate_window, 0.0);
        assert_eq!(recorder.snapshot().predictions_today, 4);
    }

    #[test]
    fn test_concurrent_writers_and_reader() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 100;

        let (_, recorder) = recorder(TelemetryConfig::default());
        let recorder = Arc::new(recorder);
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let recorder = recorder.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut seen = 0u64;
                while !done.load(Ordering::Acquire) {
                    let snapshot = recorder.snapshot();
                    assert!(snapshot.feed_len <= 200);
                    assert!(snapshot.latency_samples <= 500);
                    // counter and rings move together
                    assert_eq!(
                        snapshot.latency_samples as u64,
                        snapshot.predictions_today.min(500)
                    );
                    assert_eq!(
                        snapshot.feed_len as u64,
                        snapshot.predictions_today.min(200)
                    );
                    assert!(snapshot.predictions_today >= seen);
                    seen = snapshot.predictions_today;
                }
            })
        };

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let recorder = recorder.clone();
                thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        recorder.record_prediction(&result(&format!("w{w}-{i}"), w as f64));
                        recorder.record_failure();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.predictions_today, (WRITERS * PER_WRITER) as u64);
        assert_eq!(snapshot.latency_samples, (WRITERS * PER_WRITER).min(500));
        assert_eq!(snapshot.feed_len, 200);
        // each writer alternates, so the last 500 outcomes hold both kinds
        assert!(snapshot.error_rate_window > 0.0 && snapshot.error_rate_window < 1.0);
    }

    #[test]
    fn test_concurrent_rollover_loses_nothing() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 40;

        let (clock, recorder) = recorder(TelemetryConfig::default());
        let recorder = Arc::new(recorder);

        let flipper = {
            let recorder = recorder.clone();
            let clock = clock.clone();
            thread::spawn(move || {
                while recorder.snapshot().predictions_today < 50 {
                    thread::yield_now();
                }
                clock.set(at(2, 0));
            })
        };

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let recorder = recorder.clone();
                thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        recorder.record_prediction(&result(&format!("w{w}-{i}"), 1.0));
                        thread::yield_now();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        flipper.join().unwrap();
        recorder.record_prediction(&result("last", 1.0));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.day, at(2, 0).date());

        // 161 records fit the 200-slot feed
        let feed = recorder.recent(200);
        assert_eq!(feed.len(), WRITERS * PER_WRITER + 1);
        assert!(feed.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let on_new_day = feed
            .iter()
            .filter(|r| r.timestamp.date() == snapshot.day)
            .count();
        assert_eq!(snapshot.predictions_today, on_new_day as u64);
        assert_eq!(snapshot.latency_samples, on_new_day);
    }

    proptest! {
        #[test]
        fn prop_rings_stay_bounded(
            latencies in proptest::collection::vec(0.0f64..1000.0, 1..700),
            latency_capacity in 1usize..600,
            feed_capacity in 1usize..=200,
        ) {
            let config = TelemetryConfig {
                latency_capacity,
                feed_capacity,
                error_window: 500,
            };
            let (_, recorder) = recorder(config);
            for (i, latency) in latencies.iter().enumerate() {
                recorder.record_prediction(&result(&i.to_string(), *latency));
            }

            let snapshot = recorder.snapshot();
            let n = latencies.len();
            prop_assert_eq!(snapshot.latency_samples, n.min(latency_capacity));
            prop_assert_eq!(snapshot.feed_len, n.min(feed_capacity));
            prop_assert_eq!(snapshot.predictions_today, n as u64);

            // newest first, oldest evicted
            let feed = recorder.recent(feed_capacity);
            prop_assert_eq!(&feed[0].result.model_id, &(n - 1).to_string());
            let last = n - feed.len();
            prop_assert_eq!(&feed[feed.len() - 1].result.model_id, &last.to_string());

            // mean covers exactly the retained tail
            let kept = &latencies[n - snapshot.latency_samples..];
            let expected = kept.iter().sum::<f64>() / kept.len() as f64;
            prop_assert!((snapshot.avg_latency_ms - expected).abs() < 1e-9);
        }
    }
}
