// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire messages exchanged between faculty clients, the broker and the
//! allocation workers.
//!
//! Everything on the wire is UTF-8 JSON (see `README` for rationale); this
//! module only defines the shapes, not the transport.

use serde::{Deserialize, Serialize};

/// One program's resource request within a faculty request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub classrooms: u32,
    #[serde(default)]
    pub labs: u32,
}

/// A faculty's allocation request for a term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyRequest {
    pub faculty: String,
    pub semester: String,
    pub programs: Vec<Program>,
}

/// The liveness probe variant of the request message (`{"type": "ping"}`).
///
/// Kept separate from `FacultyRequest` because the wire format does not tag
/// the allocation variant; see `IncomingMessage` for how the two are told
/// apart on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingKind {
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    #[serde(rename = "type")]
    pub kind: PingKind,
}

/// Either a liveness probe or an allocation request, as received by a worker
/// or a broker-fronted client.
///
/// `serde(untagged)` is deliberate: the original protocol never added a
/// discriminant to the allocation variant, so the two shapes are
/// disambiguated structurally (presence of `"type": "ping"` vs. the
/// `faculty`/`semester`/`programs` triple).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Ping(PingRequest),
    Allocate(FacultyRequest),
}

/// Result of allocating one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub faculty: String,
    pub program: String,
    pub classrooms_requested: u32,
    pub labs_requested: u32,
    #[serde(default)]
    pub classrooms_assigned: u32,
    #[serde(default)]
    pub labs_assigned: u32,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub classrooms_as_labs: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Snapshot of a term's remaining capacity, as carried in responses and in
/// `state_asignaciones.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub classrooms_available: u32,
    pub labs_available: u32,
}

/// Successful allocation response sent back to a faculty client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub result: Vec<AllocationResult>,
    pub state: CountersSnapshot,
}

/// Reply to a `{"type": "ping"}` probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: &'static str,
}

impl Default for PingResponse {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

/// Reply sent for a malformed or otherwise rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}
