// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory worker liveness table fed by the capture tap.
//!
//! Grounded in `broker.py`'s `workers_alive` dict: every frame the capture
//! subscriber sees is keyed by the first 6 hex characters of its ZeroMQ
//! routing identity, with the time it was last seen. This is pure
//! observability — it never feeds back into routing or failover, which stay
//! the exclusive responsibility of the health service.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const TIMEOUT: Duration = Duration::from_secs(10);

/// One row of the liveness report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessRow {
    pub worker_prefix: String,
    pub seconds_since_last_frame: u64,
    pub status: &'static str,
}

/// Thread-safe last-seen table, updated by the capture subscriber and read
/// by the periodic reporter.
#[derive(Default)]
pub struct WorkersAlive {
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl WorkersAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `routing_id` produced a frame just now.
    pub fn record_seen(&self, routing_id: &[u8]) {
        let prefix = routing_id_prefix(routing_id);
        self.last_seen.lock().insert(prefix, Instant::now());
    }

    /// Snapshot the table as a liveness report, sorted by worker prefix for
    /// stable log output.
    pub fn report(&self) -> Vec<LivenessRow> {
        let table = self.last_seen.lock();
        let mut rows: Vec<LivenessRow> = table
            .iter()
            .map(|(prefix, seen)| {
                let age = seen.elapsed();
                let status = if age > TIMEOUT { "TIMEOUT" } else { "OK" };
                LivenessRow {
                    worker_prefix: prefix.clone(),
                    seconds_since_last_frame: age.as_secs(),
                    status,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.worker_prefix.cmp(&b.worker_prefix));
        rows
    }
}

fn routing_id_prefix(routing_id: &[u8]) -> String {
    routing_id
        .iter()
        .take(3)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newly_seen_worker_reports_ok() {
        let table = WorkersAlive::new();
        table.record_seen(&[0xab, 0xcd, 0xef]);
        let report = table.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].worker_prefix, "abcdef");
        assert_eq!(report[0].status, "OK");
    }

    #[test]
    fn distinct_routing_ids_produce_distinct_rows() {
        let table = WorkersAlive::new();
        table.record_seen(&[0x01, 0x02, 0x03]);
        table.record_seen(&[0x04, 0x05, 0x06]);
        assert_eq!(table.report().len(), 2);
    }

    #[test]
    fn re_seeing_a_worker_updates_rather_than_duplicates() {
        let table = WorkersAlive::new();
        table.record_seen(&[0x01, 0x02, 0x03]);
        table.record_seen(&[0x01, 0x02, 0x03]);
        assert_eq!(table.report().len(), 1);
    }
}
