// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One faculty's local REP listener: acknowledges the submitter
//! immediately and hands the request to the dispatch pool.
//!
//! Grounded in `facultades.py`'s per-faculty listener, reimplemented as a
//! thread rather than a process (REDESIGN FLAGS) and backed by the shared
//! worker pool instead of a spawn-per-request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde_json::Value;

use crate::dispatch::Job;

const POLL_INTERVAL_MS: i32 = 1000;

/// Binds a local REP socket for one faculty and forwards submitted
/// requests to the dispatch pool, polling `shutdown` between receives.
pub struct FacultyListener {
    pub faculty: String,
    pub bind: String,
}

impl FacultyListener {
    pub fn new(faculty: impl Into<String>, bind: impl Into<String>) -> Self {
        Self {
            faculty: faculty.into(),
            bind: bind.into(),
        }
    }

    pub fn run(
        &self,
        ctx: &zmq::Context,
        sender: Sender<Job>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), zmq::Error> {
        let socket = ctx.socket(zmq::REP)?;
        socket.bind(&self.bind)?;
        socket.set_rcvtimeo(POLL_INTERVAL_MS)?;

        tracing::info!(faculty = %self.faculty, bind = %self.bind, "faculty listener ready");

        while !shutdown.load(Ordering::SeqCst) {
            let raw = match socket.recv_string(0) {
                Ok(Ok(s)) => s,
                Ok(Err(_)) => {
                    tracing::warn!(faculty = %self.faculty, "received non-UTF8 submission");
                    let _ = socket.send(r#"{"status":"error","message":"invalid encoding"}"#, 0);
                    continue;
                }
                Err(zmq::Error::EAGAIN) => continue,
                Err(e) => {
                    tracing::error!(faculty = %self.faculty, error = %e, "listener recv error");
                    continue;
                }
            };

            // Acknowledge the submitter before the broker round-trip even
            // starts, so submission throughput never waits on allocation.
            if let Err(e) = socket.send(r#"{"status":"ok"}"#, 0) {
                tracing::error!(faculty = %self.faculty, error = %e, "failed to ack submission");
                continue;
            }

            let term = extract_term(&raw).unwrap_or_default();
            let job = Job {
                raw,
                faculty: self.faculty.clone(),
                term,
            };
            if sender.send(job).is_err() {
                tracing::error!(faculty = %self.faculty, "dispatch pool is no longer accepting jobs");
            }
        }

        tracing::info!(faculty = %self.faculty, "listener shutting down");
        Ok(())
    }
}

fn extract_term(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    value.get("semester")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_semester_field() {
        let raw = r#"{"faculty":"F","semester":"2025-1","programs":[]}"#;
        assert_eq!(extract_term(raw).as_deref(), Some("2025-1"));
    }

    #[test]
    fn missing_semester_yields_none() {
        assert_eq!(extract_term(r#"{"faculty":"F"}"#), None);
    }

    #[test]
    fn invalid_json_yields_none() {
        assert_eq!(extract_term("not json"), None);
    }
}
