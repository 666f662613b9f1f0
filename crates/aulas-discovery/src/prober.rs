// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heartbeat probing and broker-address resolution.
//!
//! Grounded in `HealtChecker.py` / `health_checkbb.py`: a fresh REQ socket
//! per probe, a short timeout, and LINGER=0 so a dead broker never leaves
//! the health service blocked. The service itself is stateless — every
//! call probes the brokers again, so recovery of the primary is visible on
//! the very next request.

use aulas_proto::BrokerTopology;

/// Which of a broker's two client-facing sockets a caller wants resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Front,
    Back,
}

impl Probe {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "front" => Some(Probe::Front),
            "back" => Some(Probe::Back),
            _ => None,
        }
    }
}

/// Probes broker heartbeat endpoints over fresh REQ sockets.
pub struct Prober {
    ctx: zmq::Context,
    timeout_ms: i32,
}

impl Prober {
    pub fn new(ctx: zmq::Context, timeout_ms: i32) -> Self {
        Self { ctx, timeout_ms }
    }

    /// Send `PING` to `heartbeat_endpoint` and check for a `PONG` within
    /// the configured timeout. The REQ socket is scoped to this call and
    /// closed on every exit path, including error ones.
    pub fn is_alive(&self, heartbeat_endpoint: &str) -> bool {
        self.probe(heartbeat_endpoint).unwrap_or(false)
    }

    fn probe(&self, heartbeat_endpoint: &str) -> Result<bool, zmq::Error> {
        let socket = self.ctx.socket(zmq::REQ)?;
        socket.set_rcvtimeo(self.timeout_ms)?;
        socket.set_sndtimeo(self.timeout_ms)?;
        socket.set_linger(0)?;
        socket.connect(heartbeat_endpoint)?;

        socket.send("PING", 0)?;
        match socket.recv_bytes(0) {
            Ok(reply) => Ok(reply == b"PONG"),
            Err(zmq::Error::EAGAIN) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Resolve the live broker's endpoint for `probe`, trying the primary
    /// before the secondary. Returns an empty string if neither answers.
    pub fn resolve(&self, topology: &BrokerTopology, probe: Probe) -> String {
        if self.is_alive(&topology.primary.heartbeat) {
            return endpoint_for(&topology.primary, probe);
        }
        if self.is_alive(&topology.secondary.heartbeat) {
            return endpoint_for(&topology.secondary, probe);
        }
        String::new()
    }
}

fn endpoint_for(endpoints: &aulas_proto::BrokerEndpoints, probe: Probe) -> String {
    match probe {
        Probe::Front => endpoints.front.clone(),
        Probe::Back => endpoints.back.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aulas_proto::BrokerEndpoints;
    use std::thread;

    /// Binds a REP socket on an ephemeral port that always answers PONG,
    /// returning its resolved address.
    fn spawn_pong_responder(ctx: &zmq::Context) -> String {
        let socket = ctx.socket(zmq::REP).unwrap();
        socket.bind("tcp://127.0.0.1:0").unwrap();
        let endpoint = socket.get_last_endpoint().unwrap().unwrap();
        thread::spawn(move || {
            if socket.recv_bytes(0).is_ok() {
                let _ = socket.send("PONG", 0);
            }
        });
        endpoint
    }

    #[test]
    fn alive_broker_answers_pong() {
        let ctx = zmq::Context::new();
        let endpoint = spawn_pong_responder(&ctx);
        let prober = Prober::new(ctx, 500);
        assert!(prober.is_alive(&endpoint));
    }

    #[test]
    fn unreachable_broker_is_not_alive() {
        let ctx = zmq::Context::new();
        let prober = Prober::new(ctx, 200);
        assert!(!prober.is_alive("tcp://127.0.0.1:1"));
    }

    #[test]
    fn resolve_falls_back_to_secondary_when_primary_is_down() {
        let ctx = zmq::Context::new();
        let secondary_hb = spawn_pong_responder(&ctx);
        let mut topology = BrokerTopology {
            primary: BrokerEndpoints::primary("127.0.0.1"),
            secondary: BrokerEndpoints::secondary("127.0.0.1"),
        };
        topology.primary.heartbeat = "tcp://127.0.0.1:1".to_string();
        topology.secondary.heartbeat = secondary_hb;

        let prober = Prober::new(ctx, 300);
        let resolved = prober.resolve(&topology, Probe::Front);
        assert_eq!(resolved, topology.secondary.front);
    }

    #[test]
    fn resolve_returns_empty_when_nothing_is_alive() {
        let ctx = zmq::Context::new();
        let mut topology = BrokerTopology::default();
        topology.primary.heartbeat = "tcp://127.0.0.1:1".to_string();
        topology.secondary.heartbeat = "tcp://127.0.0.1:2".to_string();

        let prober = Prober::new(ctx, 200);
        assert_eq!(prober.resolve(&topology, Probe::Front), "");
    }
}
