// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request handling: turns one parsed [`IncomingMessage`] into a reply,
//! driving the counter store one program at a time.

use aulas_proto::{
    AllocationResponse, ErrorResponse, FacultyRequest, IncomingMessage, PingResponse, PoolConfig,
};
use aulas_store::{CounterStore, StoreError};

use crate::policy::apply_program;

/// Errors raised while servicing one request.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("counter store error: {0}")]
    Store(#[from] StoreError),
}

/// Reply a worker sends back over its REP socket.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum WorkerReply {
    Ping(PingResponse),
    Allocation(AllocationResponse),
    Error(ErrorResponse),
}

/// Parse a raw request payload, dispatching to ping or allocation handling.
///
/// Never returns an error for malformed input: a parse failure is reported
/// as a [`WorkerReply::Error`] so the REP socket always gets exactly one
/// reply. Only a [`WorkerError::Store`] escapes, since the spec treats a
/// store failure as fatal for the worker process.
pub fn handle_request(
    store: &CounterStore,
    pools: PoolConfig,
    raw: &str,
) -> Result<WorkerReply, WorkerError> {
    let message: IncomingMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(e) => return Ok(WorkerReply::Error(ErrorResponse::new(e.to_string()))),
    };

    match message {
        IncomingMessage::Ping(_) => Ok(WorkerReply::Ping(PingResponse::default())),
        IncomingMessage::Allocate(request) => match allocate(store, pools, &request) {
            Ok(response) => Ok(WorkerReply::Allocation(response)),
            Err(WorkerError::MalformedRequest(reason)) => {
                Ok(WorkerReply::Error(ErrorResponse::new(reason)))
            }
            Err(err @ WorkerError::Store(_)) => Err(err),
        },
    }
}

/// Apply the allocation policy to every program in `request`, sequentially
/// and in submission order, one counter-store lease per program.
fn allocate(
    store: &CounterStore,
    pools: PoolConfig,
    request: &FacultyRequest,
) -> Result<AllocationResponse, WorkerError> {
    if request.faculty.trim().is_empty() || request.semester.trim().is_empty() {
        return Err(WorkerError::MalformedRequest(
            "faculty and semester must be non-empty".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(request.programs.len());

    for program in &request.programs {
        let (lease, counters) = store.acquire_and_read(&request.semester, pools)?;
        let (updated, result) = apply_program(counters, &request.faculty, program);
        store.write_and_release(lease, updated)?;
        results.push(result);
    }

    // Re-read rather than reuse the last write's snapshot: another request
    // for the same term may have taken a lease and decremented the counters
    // between this request's last write and its reply.
    let (lease, state) = store.acquire_and_read(&request.semester, pools)?;
    store.write_and_release(lease, state)?;

    Ok(AllocationResponse {
        result: results,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aulas_proto::Program;

    fn temp_store() -> CounterStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path().join("recursos.db");
        CounterStore::open(path).unwrap()
    }

    #[test]
    fn ping_is_answered_without_touching_the_store() {
        let store = temp_store();
        let reply = handle_request(&store, PoolConfig::default(), r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(reply, WorkerReply::Ping(_)));
    }

    #[test]
    fn malformed_json_yields_error_reply_not_err() {
        let store = temp_store();
        let reply = handle_request(&store, PoolConfig::default(), "not json").unwrap();
        assert!(matches!(reply, WorkerReply::Error(_)));
    }

    #[test]
    fn allocation_request_produces_expected_state() {
        let store = temp_store();
        let pools = PoolConfig {
            classrooms_orig: 380,
            labs_orig: 60,
        };
        let request = FacultyRequest {
            faculty: "F".to_string(),
            semester: "2025-1".to_string(),
            programs: vec![Program {
                name: "A".to_string(),
                classrooms: 7,
                labs: 3,
            }],
        };
        let raw = serde_json::to_string(&request).unwrap();
        let reply = handle_request(&store, pools, &raw).unwrap();
        match reply {
            WorkerReply::Allocation(response) => {
                assert_eq!(response.result.len(), 1);
                assert_eq!(response.result[0].labs_assigned, 3);
                assert_eq!(response.result[0].classrooms_assigned, 7);
                assert_eq!(response.state.classrooms_available, 373);
                assert_eq!(response.state.labs_available, 57);
            }
            _ => panic!("expected allocation reply"),
        }
    }

    #[test]
    fn empty_faculty_yields_error_reply_not_err() {
        let store = temp_store();
        let request = FacultyRequest {
            faculty: String::new(),
            semester: "2025-1".to_string(),
            programs: vec![],
        };
        let raw = serde_json::to_string(&request).unwrap();
        let reply = handle_request(&store, PoolConfig::default(), &raw).unwrap();
        assert!(matches!(reply, WorkerReply::Error(_)));
    }
}
