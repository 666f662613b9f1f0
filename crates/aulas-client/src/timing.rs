// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wall-clock cronometer: first and most recent successful reply, reported
//! as elapsed time on shutdown. Grounded in `facultades_broker.py`'s
//! `multiprocessing.Value`/`Lock` timing pair, reimplemented with a
//! `parking_lot::Mutex` since everything here runs in one process.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Default)]
struct Marks {
    first_success: Option<Instant>,
    last_success: Option<Instant>,
}

/// Tracks the first and most recent successful broker reply across every
/// faculty listener in this process.
#[derive(Default)]
pub struct Cronometer {
    marks: Mutex<Marks>,
}

impl Cronometer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful reply just now.
    pub fn record_success(&self) {
        let mut marks = self.marks.lock();
        let now = Instant::now();
        if marks.first_success.is_none() {
            marks.first_success = Some(now);
        }
        marks.last_success = Some(now);
    }

    /// Elapsed time between the first and the most recent success, if any
    /// request has succeeded yet.
    pub fn elapsed(&self) -> Option<Duration> {
        let marks = self.marks.lock();
        match (marks.first_success, marks.last_success) {
            (Some(first), Some(last)) => Some(last.saturating_duration_since(first)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn no_successes_reports_no_elapsed_time() {
        let c = Cronometer::new();
        assert!(c.elapsed().is_none());
    }

    #[test]
    fn single_success_reports_zero_elapsed() {
        let c = Cronometer::new();
        c.record_success();
        assert_eq!(c.elapsed(), Some(Duration::ZERO));
    }

    #[test]
    fn repeated_success_extends_elapsed_time() {
        let c = Cronometer::new();
        c.record_success();
        sleep(Duration::from_millis(5));
        c.record_success();
        assert!(c.elapsed().unwrap() >= Duration::from_millis(5));
    }
}
