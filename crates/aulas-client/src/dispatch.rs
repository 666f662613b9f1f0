// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded worker pool that takes requests off each faculty listener's
//! queue and drives them through the broker client.
//!
//! The original spawned a fresh OS process per outbound request; this pool
//! of long-lived threads reuses the same handful of workers for every
//! faculty instead, cutting dispatch cost by orders of magnitude while
//! keeping requests processed roughly in arrival order per worker.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::broker_client::{BrokerClient, BrokerClientConfig};
use crate::results::ResultStore;
use crate::timing::Cronometer;

/// One dispatched request: the raw JSON payload to forward to the broker,
/// and the bookkeeping needed to file its reply.
#[derive(Debug, Clone)]
pub struct Job {
    pub raw: String,
    pub faculty: String,
    pub term: String,
}

/// Spawns `workers` long-lived threads sharing one bounded channel.
///
/// Returns the sender side for listeners to push jobs onto, plus the
/// threads' join handles. Each worker thread exits once every sender is
/// dropped and the channel drains, so the caller must drop its `Sender`
/// before joining these handles on shutdown or the join will block forever.
pub fn spawn_pool(
    workers: usize,
    capacity: usize,
    ctx: zmq::Context,
    broker_config: BrokerClientConfig,
    results: Arc<ResultStore>,
    cronometer: Arc<Cronometer>,
) -> (Sender<Job>, Vec<JoinHandle<()>>) {
    let (tx, rx): (Sender<Job>, Receiver<Job>) = crossbeam_channel::bounded(capacity);

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let rx = rx.clone();
        let client = BrokerClient::new(ctx.clone(), broker_config.clone());
        let results = results.clone();
        let cronometer = cronometer.clone();
        let handle = std::thread::Builder::new()
            .name(format!("dispatch-{id}"))
            .spawn(move || run_worker(rx, client, results, cronometer))
            .expect("failed to spawn dispatch worker thread");
        handles.push(handle);
    }

    (tx, handles)
}

fn run_worker(
    rx: Receiver<Job>,
    client: BrokerClient,
    results: Arc<ResultStore>,
    cronometer: Arc<Cronometer>,
) {
    while let Ok(job) = rx.recv() {
        match client.send(&job.raw) {
            Ok(reply) => handle_reply(&job, &reply, &results, &cronometer),
            Err(e) => {
                tracing::error!(
                    faculty = %job.faculty,
                    term = %job.term,
                    error = %e,
                    "request to broker failed after retry"
                );
            }
        }
    }
}

fn handle_reply(job: &Job, reply: &str, results: &ResultStore, cronometer: &Cronometer) {
    let parsed: aulas_proto::AllocationResponse = match serde_json::from_str(reply) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                faculty = %job.faculty,
                term = %job.term,
                error = %e,
                reply = %reply,
                "broker reply did not match the expected allocation response shape"
            );
            return;
        }
    };

    cronometer.record_success();

    if job.term.is_empty() {
        tracing::warn!(faculty = %job.faculty, "no term known for this job, skipping result persistence");
        return;
    }

    if let Err(e) = results.merge_allocation(&job.term, &parsed.result) {
        tracing::error!(term = %job.term, error = %e, "failed to merge allocation results");
    }
    if let Err(e) = results.write_state(&job.term, parsed.state) {
        tracing::error!(term = %job.term, error = %e, "failed to write state snapshot");
    }
}
