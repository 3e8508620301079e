//! Read-only monitoring views over the telemetry recorder

use crate::config::MAX_LIVE_FEED_LIMIT;
use crate::telemetry::{FeedRecord, ServiceStatus, TelemetryRecorder};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_LIVE_FEED_LIMIT: i64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringSummary {
    pub predictions_today: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate_window: f64,
    pub status: ServiceStatus,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingResponse {
    pub status: String,
    pub latency_ms: f64,
    pub timestamp: NaiveDateTime,
}

/// Clamp a caller-supplied feed limit into `[1, 200]`
pub fn clamp_limit(limit: i64) -> usize {
    limit.clamp(1, MAX_LIVE_FEED_LIMIT as i64) as usize
}

#[derive(Debug, Clone)]
pub struct MonitoringReporter {
    recorder: Arc<TelemetryRecorder>,
}

impl MonitoringReporter {
    pub fn new(recorder: Arc<TelemetryRecorder>) -> Self {
        Self { recorder }
    }

    pub fn summary(&self) -> MonitoringSummary {
        let snapshot = self.recorder.snapshot();
        MonitoringSummary {
            predictions_today: snapshot.predictions_today,
            avg_latency_ms: snapshot.avg_latency_ms,
            p95_latency_ms: snapshot.p95_latency_ms,
            error_rate_window: snapshot.error_rate_window,
            status: snapshot.status,
            timestamp: self.recorder.clock().now(),
        }
    }

    pub fn live_feed(&self, limit: i64) -> Vec<FeedRecord> {
        self.recorder.recent(clamp_limit(limit))
    }

    /// Liveness probe timed around a telemetry read, no inference involved
    pub fn ping(&self) -> PingResponse {
        let start = Instant::now();
        let status = self.recorder.status();
        PingResponse {
            status: match status {
                ServiceStatus::Operational => "ok".to_string(),
                ServiceStatus::Degraded => "degraded".to_string(),
            },
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            timestamp: self.recorder.clock().now(),
        }
    }
}
