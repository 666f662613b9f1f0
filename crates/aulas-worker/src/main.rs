// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aulas_proto::PoolConfig;
use aulas_store::CounterStore;
use aulas_worker::{handle_request, WorkerError, WorkerReply};
use clap::Parser;

/// Allocation worker: connects to a broker's DEALER backend over a REP
/// socket and serves classroom/lab allocation requests for one term space.
#[derive(Debug, Parser)]
#[command(name = "aulas-worker", version, about)]
struct Args {
    /// Broker DEALER backend to connect the REP socket to.
    #[arg(long, default_value = "tcp://127.0.0.1:5560")]
    broker_back: String,

    /// Path to the SQLite counter store.
    #[arg(long, default_value = "recursos.db")]
    db_path: PathBuf,

    /// Original classroom pool size, applied the first time a term is seen.
    #[arg(long, default_value_t = 380)]
    classrooms_orig: u32,

    /// Original laboratory pool size, applied the first time a term is seen.
    #[arg(long, default_value_t = 60)]
    labs_orig: u32,

    /// Poll timeout in milliseconds between shutdown-flag checks.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: i32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(
        broker_back = %args.broker_back,
        db_path = %args.db_path.display(),
        classrooms_orig = args.classrooms_orig,
        labs_orig = args.labs_orig,
        "starting allocation worker"
    );

    let pools = PoolConfig {
        classrooms_orig: args.classrooms_orig,
        labs_orig: args.labs_orig,
    };
    let store = CounterStore::open(&args.db_path)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::REP)?;
    socket.connect(&args.broker_back)?;
    socket.set_rcvtimeo(args.poll_interval_ms)?;

    tracing::info!("worker ready");

    while !shutdown.load(Ordering::SeqCst) {
        let raw = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                tracing::warn!("received non-UTF8 frame, ignoring");
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                tracing::error!(error = %e, "socket recv error");
                continue;
            }
        };

        match handle_request(&store, pools, &raw) {
            Ok(reply) => send_reply(&socket, &reply)?,
            Err(WorkerError::Store(store_err)) => {
                tracing::error!(error = %store_err, "fatal counter store error");
                let error_reply =
                    WorkerReply::Error(aulas_proto::ErrorResponse::new(store_err.to_string()));
                let _ = send_reply(&socket, &error_reply);
                anyhow::bail!("counter store failed: {store_err}");
            }
            Err(WorkerError::MalformedRequest(reason)) => {
                // handle_request already folds this into an error reply; a
                // bare Err here would only occur from a future code path,
                // so still answer the REP socket rather than leave it hung.
                let error_reply = WorkerReply::Error(aulas_proto::ErrorResponse::new(reason));
                send_reply(&socket, &error_reply)?;
            }
        }
    }

    tracing::info!("worker shutting down");
    drop(socket);
    std::thread::sleep(Duration::from_millis(50));
    Ok(())
}

fn send_reply(socket: &zmq::Socket, reply: &WorkerReply) -> anyhow::Result<()> {
    let body = serde_json::to_string(reply)?;
    socket.send(&body, 0)?;
    Ok(())
}
