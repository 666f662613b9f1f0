// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::Arc;
use std::time::Duration;

use aulas_broker::{WorkersAlive, HEARTBEAT_PING, HEARTBEAT_PONG};
use aulas_proto::BrokerEndpoints;
use clap::Parser;

const CAPTURE_ENDPOINT: &str = "inproc://capture";

/// Transparent ROUTER/DEALER proxy fronting the allocation workers.
///
/// Runs as either the primary or the secondary of a broker pair; the two
/// differ only in which ports they default to (see `--role`), and the
/// health service is what decides which one clients should use.
#[derive(Debug, Parser)]
#[command(name = "aulas-broker", version, about)]
struct Args {
    /// Which half of the broker pair this instance is.
    #[arg(long, value_enum, default_value_t = Role::Primary)]
    role: Role,

    /// Host/IP to bind all three sockets on.
    #[arg(long, default_value = "127.0.0.1")]
    bind_host: String,

    /// Override the FRONT endpoint instead of deriving it from `--role`.
    #[arg(long)]
    front: Option<String>,
    /// Override the BACK endpoint instead of deriving it from `--role`.
    #[arg(long)]
    back: Option<String>,
    /// Override the heartbeat endpoint instead of deriving it from `--role`.
    #[arg(long)]
    heartbeat: Option<String>,

    /// Seconds between liveness-table log lines.
    #[arg(long, default_value_t = 5)]
    report_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Role {
    Primary,
    Secondary,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let defaults = match args.role {
        Role::Primary => BrokerEndpoints::primary(&args.bind_host),
        Role::Secondary => BrokerEndpoints::secondary(&args.bind_host),
    };
    let endpoints = BrokerEndpoints {
        front: args.front.unwrap_or(defaults.front),
        back: args.back.unwrap_or(defaults.back),
        heartbeat: args.heartbeat.unwrap_or(defaults.heartbeat),
    };

    tracing::info!(
        role = ?args.role,
        front = %endpoints.front,
        back = %endpoints.back,
        heartbeat = %endpoints.heartbeat,
        "starting broker"
    );

    let ctx = zmq::Context::new();
    {
        let ctx = ctx.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received, terminating zmq context");
            let _ = ctx.destroy();
        })?;
    }

    let front = ctx.socket(zmq::ROUTER)?;
    front.bind(&endpoints.front)?;

    let back = ctx.socket(zmq::DEALER)?;
    back.bind(&endpoints.back)?;

    let capture_pub = ctx.socket(zmq::PUB)?;
    capture_pub.bind(CAPTURE_ENDPOINT)?;

    let workers_alive = Arc::new(WorkersAlive::new());

    spawn_capture_subscriber(&ctx, workers_alive.clone())?;
    spawn_reporter(workers_alive, Duration::from_secs(args.report_interval_secs));
    spawn_heartbeat_responder(&ctx, endpoints.heartbeat.clone())?;

    tracing::info!("proxy running");
    // Blocks until the process is killed or the context is torn down; the
    // broker detects neither primary/secondary failure nor failover itself,
    // that is the health service's job.
    match zmq::proxy_with_capture(&front, &back, &capture_pub) {
        Ok(()) => {}
        Err(zmq::Error::ETERM) => tracing::info!("broker shutting down"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn spawn_capture_subscriber(
    ctx: &zmq::Context,
    workers_alive: Arc<WorkersAlive>,
) -> anyhow::Result<()> {
    let sub = ctx.socket(zmq::SUB)?;
    sub.connect(CAPTURE_ENDPOINT)?;
    sub.set_subscribe(b"")?;

    std::thread::Builder::new()
        .name("capture-subscriber".into())
        .spawn(move || loop {
            match sub.recv_multipart(0) {
                Ok(frames) => {
                    if let Some(routing_id) = frames.first() {
                        workers_alive.record_seen(routing_id);
                    }
                }
                Err(zmq::Error::ETERM) => break,
                Err(e) => {
                    tracing::error!(error = %e, "capture subscriber recv error");
                    break;
                }
            }
        })?;
    Ok(())
}

fn spawn_reporter(workers_alive: Arc<WorkersAlive>, interval: Duration) {
    std::thread::Builder::new()
        .name("liveness-reporter".into())
        .spawn(move || loop {
            std::thread::sleep(interval);
            for row in workers_alive.report() {
                tracing::info!(
                    worker = %row.worker_prefix,
                    age_secs = row.seconds_since_last_frame,
                    status = row.status,
                    "worker liveness"
                );
            }
        })
        .expect("failed to spawn liveness reporter thread");
}

fn spawn_heartbeat_responder(ctx: &zmq::Context, endpoint: String) -> anyhow::Result<()> {
    let hb = ctx.socket(zmq::REP)?;
    hb.bind(&endpoint)?;

    std::thread::Builder::new()
        .name("heartbeat".into())
        .spawn(move || loop {
            match hb.recv_bytes(0) {
                Ok(msg) if msg == HEARTBEAT_PING => {
                    if let Err(e) = hb.send(HEARTBEAT_PONG, 0) {
                        tracing::error!(error = %e, "failed to send heartbeat pong");
                    }
                }
                Ok(_) => {
                    // Unrecognized payload; still must reply once for the
                    // REP pattern's sake, with something that is not PONG.
                    let _ = hb.send(b"UNKNOWN", 0);
                }
                Err(zmq::Error::ETERM) => break,
                Err(e) => {
                    tracing::error!(error = %e, "heartbeat recv error");
                    break;
                }
            }
        })?;
    Ok(())
}
