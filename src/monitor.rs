use std::time::{Duration, Instant};

use chrono::Local;
use tracing::info;

#[derive(Default)]
struct Counters {
    received: u64,
    accepted: u64,
    rewritten: u64,
    sent_pkts: u64,
    sent_bytes: u64,
    failed: u64,
}

/// Per-interval traffic report for the queue loop.
pub struct Monitor {
    name: String,
    interval: Duration,
    counters: Counters,
    last_report: Instant,
}

impl Monitor {
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            counters: Counters::default(),
            last_report: Instant::now(),
        }
    }

    pub fn record_received(&mut self) {
        self.counters.received += 1;
    }

    pub fn record_accepted(&mut self) {
        self.counters.accepted += 1;
    }

    pub fn record_rewritten(&mut self) {
        self.counters.rewritten += 1;
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.counters.sent_pkts += 1;
        self.counters.sent_bytes += bytes as u64;
    }

    pub fn record_failed(&mut self) {
        self.counters.failed += 1;
    }

    /// Logs the counters and resets them once the interval has passed.
    pub fn check_and_report(&mut self) {
        let elapsed = self.last_report.elapsed();
        if elapsed < self.interval {
            return;
        }

        let c = std::mem::take(&mut self.counters);
        if c.received > 0 || c.failed > 0 {
            let mbps = (c.sent_bytes as f64 * 8.0) / 1_000_000.0 / elapsed.as_secs_f64();
            info!(
                "[{}] {}: in {} | accepted {} | rewritten {} | sent {} ({:.2} Mbps) | failed {}",
                Local::now().format("%H:%M:%S"),
                self.name,
                c.received,
                c.accepted,
                c.rewritten,
                c.sent_pkts,
                mbps,
                c.failed,
            );
        }
        self.last_report = Instant::now();
    }
}
