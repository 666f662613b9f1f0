// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::path::PathBuf;

use aulas_discovery::{Probe, Prober};
use aulas_proto::BrokerTopology;
use clap::Parser;

/// Health service: a single REP endpoint that maps `"front"`/`"back"` to
/// the currently live broker's corresponding socket address.
#[derive(Debug, Parser)]
#[command(name = "aulas-discovery", version, about)]
struct Args {
    /// Endpoint this service's own REP socket binds to.
    #[arg(long, default_value = "tcp://127.0.0.1:6000")]
    bind: String,

    /// Optional JSON file overriding the default broker topology.
    #[arg(long)]
    topology_file: Option<PathBuf>,

    /// Milliseconds to wait for a heartbeat PONG before declaring a broker
    /// unhealthy.
    #[arg(long, default_value_t = 1000)]
    probe_timeout_ms: i32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let topology = match &args.topology_file {
        Some(path) => BrokerTopology::from_file(path)?,
        None => BrokerTopology::default(),
    };

    tracing::info!(
        bind = %args.bind,
        primary_hb = %topology.primary.heartbeat,
        secondary_hb = %topology.secondary.heartbeat,
        probe_timeout_ms = args.probe_timeout_ms,
        "starting health service"
    );

    let ctx = zmq::Context::new();
    {
        let ctx = ctx.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received, terminating zmq context");
            let _ = ctx.destroy();
        })?;
    }

    let rep = ctx.socket(zmq::REP)?;
    rep.bind(&args.bind)?;

    let prober = Prober::new(ctx.clone(), args.probe_timeout_ms);

    loop {
        let label = match rep.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                tracing::warn!("received non-UTF8 probe label");
                rep.send("", 0)?;
                continue;
            }
            Err(zmq::Error::ETERM) => {
                tracing::info!("health service shutting down");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "health service recv error");
                continue;
            }
        };

        let resolved = match Probe::parse(label.trim()) {
            Some(probe) => prober.resolve(&topology, probe),
            None => {
                tracing::warn!(label = %label, "unrecognized probe label");
                String::new()
            }
        };

        rep.send(&resolved, 0)?;
    }

    Ok(())
}
