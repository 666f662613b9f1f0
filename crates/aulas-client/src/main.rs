// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aulas_client::{spawn_pool, BrokerClientConfig, Cronometer, FacultyListener, ResultStore};
use aulas_proto::default_catalog;
use clap::Parser;

/// Faculty Client: runs one local REP listener per faculty in the catalog,
/// dispatching submitted requests to the live broker and merging replies
/// into the persisted result files.
#[derive(Debug, Parser)]
#[command(name = "aulas-client", version, about)]
struct Args {
    /// Health service endpoint to resolve the live broker through.
    #[arg(long, default_value = "tcp://127.0.0.1:6000")]
    health_endpoint: String,

    /// Directory persisted result files are written under.
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Number of worker-pool threads shared across every faculty listener.
    #[arg(long, default_value_t = 8)]
    pool_workers: usize,

    /// Bounded channel capacity for queued-but-undispatched jobs.
    #[arg(long, default_value_t = 256)]
    pool_capacity: usize,

    /// Optional JSON file overriding the default ten-faculty catalog.
    #[arg(long)]
    catalog_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let catalog = match &args.catalog_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        }
        None => default_catalog(),
    };

    tracing::info!(
        health_endpoint = %args.health_endpoint,
        results_dir = %args.results_dir.display(),
        pool_workers = args.pool_workers,
        faculties = catalog.len(),
        "starting faculty client"
    );

    let ctx = zmq::Context::new();
    let results = Arc::new(ResultStore::open(&args.results_dir)?);
    let cronometer = Arc::new(Cronometer::new());
    let broker_config = BrokerClientConfig {
        health_endpoint: args.health_endpoint.clone(),
        ..BrokerClientConfig::default()
    };

    let (sender, pool_handles) = spawn_pool(
        args.pool_workers,
        args.pool_capacity,
        ctx.clone(),
        broker_config,
        results,
        cronometer.clone(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let mut listener_handles = Vec::with_capacity(catalog.len());
    for entry in catalog {
        let ctx = ctx.clone();
        let sender = sender.clone();
        let shutdown = shutdown.clone();
        let bind = format!("tcp://127.0.0.1:{}", entry.port);
        let listener = FacultyListener::new(entry.name, bind);
        listener_handles.push(std::thread::spawn(move || {
            if let Err(e) = listener.run(&ctx, sender, shutdown) {
                tracing::error!(faculty = %listener.faculty, error = %e, "listener exited with error");
            }
        }));
    }

    for handle in listener_handles {
        let _ = handle.join();
    }

    // Every listener has stopped taking jobs; dropping the last `Sender`
    // closes the channel so the pool's `rx.recv()` loops return and the
    // threads can actually be joined instead of blocking forever.
    drop(sender);
    for handle in pool_handles {
        let _ = handle.join();
    }

    match cronometer.elapsed() {
        Some(elapsed) => tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "shutdown complete"),
        None => tracing::info!("shutdown complete, no successful allocations were recorded"),
    }
    std::thread::sleep(Duration::from_millis(50));
    Ok(())
}
