// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Talks to the health service to resolve the live broker, then sends one
//! request over a REQ socket scoped to that single attempt.
//!
//! The original implementation left REQ sockets connected after a failed
//! `send`/`recv` because `close()` lived in a `finally` block guarding a
//! variable that was sometimes never bound. Every socket created here is
//! wrapped in a `scopeguard::guard` that runs on every exit path — normal
//! return, early `?`, or panic — so a socket can never outlive its attempt.

use std::time::Duration;

use scopeguard::guard;

#[derive(Debug, thiserror::Error)]
pub enum BrokerClientError {
    #[error("no broker is currently live")]
    NoLiveBroker,
    #[error("broker request timed out")]
    Timeout,
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),
}

/// Configuration for one faculty listener's outbound REQ traffic.
#[derive(Debug, Clone)]
pub struct BrokerClientConfig {
    pub health_endpoint: String,
    pub recv_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for BrokerClientConfig {
    fn default() -> Self {
        Self {
            health_endpoint: aulas_proto::default_health_service_endpoint(),
            recv_timeout: Duration::from_secs(6),
            send_timeout: Duration::from_secs(4),
        }
    }
}

/// Sends one allocation (or ping) request to the live broker, retrying
/// once against a freshly re-resolved address on timeout.
pub struct BrokerClient {
    ctx: zmq::Context,
    config: BrokerClientConfig,
}

impl BrokerClient {
    pub fn new(ctx: zmq::Context, config: BrokerClientConfig) -> Self {
        Self { ctx, config }
    }

    pub fn send(&self, raw: &str) -> Result<String, BrokerClientError> {
        match self.try_once(raw) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(error = %e, "broker request failed, retrying once");
                self.try_once(raw)
            }
        }
    }

    fn try_once(&self, raw: &str) -> Result<String, BrokerClientError> {
        let front = query_health_service(&self.ctx, &self.config.health_endpoint, "front")?;
        if front.is_empty() {
            return Err(BrokerClientError::NoLiveBroker);
        }

        let socket = self.ctx.socket(zmq::REQ)?;
        socket.set_rcvtimeo(self.config.recv_timeout.as_millis() as i32)?;
        socket.set_sndtimeo(self.config.send_timeout.as_millis() as i32)?;
        socket.set_linger(0)?;
        socket.set_immediate(true)?;
        socket.connect(&front)?;

        let socket = guard(socket, |s| {
            let _ = s.set_linger(0);
            drop(s);
        });

        socket.send(raw, 0)?;
        match socket.recv_string(0) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BrokerClientError::Zmq(zmq::Error::EPROTO)),
            Err(zmq::Error::EAGAIN) => Err(BrokerClientError::Timeout),
            Err(e) => Err(BrokerClientError::Zmq(e)),
        }
    }
}

/// Query the health service for the live broker's `"front"`/`"back"`
/// endpoint. A fresh REQ socket per call, short timeout, never leaked.
pub fn query_health_service(
    ctx: &zmq::Context,
    health_endpoint: &str,
    label: &str,
) -> Result<String, zmq::Error> {
    let socket = ctx.socket(zmq::REQ)?;
    socket.set_rcvtimeo(1000)?;
    socket.set_sndtimeo(1000)?;
    socket.set_linger(0)?;
    socket.connect(health_endpoint)?;
    let socket = guard(socket, |s| drop(s));

    socket.send(label, 0)?;
    match socket.recv_string(0) {
        Ok(Ok(addr)) => Ok(addr),
        Ok(Err(_)) => Ok(String::new()),
        Err(zmq::Error::EAGAIN) => Ok(String::new()),
        Err(e) => Err(e),
    }
}
