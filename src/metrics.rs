//! Client-side metrics collection
//!
//! Records counters and histograms through the `metrics` facade. The
//! embedding application decides whether and how to export them; the
//! library itself installs no recorder.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record an acknowledged write of `points` points
pub fn record_write(points: usize, elapsed: Duration) {
    counter!("tsbridge.write.points").increment(points as u64);
    histogram!("tsbridge.write.duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// Record an executed query statement
pub fn record_query(elapsed: Duration) {
    counter!("tsbridge.query.statements").increment(1);
    histogram!("tsbridge.query.duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// Record a failed operation by kind ("write", "query", "connect")
pub fn record_failure(operation: &str) {
    let metric_name = format!("tsbridge.{}.failures", operation);
    counter!(metric_name).increment(1);
}
