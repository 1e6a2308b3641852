use crate::error::ProbeError;
use crate::types::{LatencySummary, Sample};
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::time::Duration;

const MAX_LATENCY_US: u64 = 60_000_000;

/// Job outcome counters shared by all workers under one lock.
#[derive(Debug, Default)]
pub struct Counters {
    pub succeeded: u64,
    pub failed: u64,
    pub errors: BTreeMap<&'static str, u64>,
    pub status_codes: BTreeMap<u16, u64>,
}

impl Counters {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, err: &ProbeError) {
        self.failed += 1;
        *self.errors.entry(err.class()).or_insert(0) += 1;
        if let ProbeError::HttpStatus(status) = err {
            *self.status_codes.entry(*status).or_insert(0) += 1;
        }
    }
}

/// Latency bookkeeping over successful samples.
pub struct LatencyStats {
    histogram: Histogram<u64>,
    count: u64,
    total: Duration,
}

impl LatencyStats {
    pub fn new() -> Self {
        let histogram = Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_US, 3)
            .expect("Failed to create histogram");

        Self {
            histogram,
            count: 0,
            total: Duration::ZERO,
        }
    }

    pub fn record(&mut self, sample: &Sample) {
        self.count += 1;
        self.total += sample.latency;

        let latency_us = (sample.latency.as_micros() as u64).clamp(1, MAX_LATENCY_US);
        let _ = self.histogram.record(latency_us);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean over recorded samples, `None` when there are none.
    pub fn average(&self) -> Option<Duration> {
        if self.count > 0 {
            let nanos = self.total.as_nanos() / u128::from(self.count);
            Some(Duration::from_nanos(nanos as u64))
        } else {
            None
        }
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        let mean = self.average()?;
        Some(LatencySummary {
            mean,
            min: us(self.histogram.min()),
            max: us(self.histogram.max()),
            p50: us(self.histogram.value_at_percentile(50.0)),
            p95: us(self.histogram.value_at_percentile(95.0)),
            p99: us(self.histogram.value_at_percentile(99.0)),
        })
    }
}

fn us(value: u64) -> Duration {
    Duration::from_micros(value)
}
