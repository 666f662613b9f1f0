// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared wire types and configuration for the Aulas allocation pipeline.
//!
//! This crate has no network or storage code of its own; it is the contract
//! that the broker, the allocation workers, the health service and the
//! faculty client all compile against so their JSON shapes never drift.

pub mod config;
pub mod faculty;
pub mod message;

pub use config::{
    default_health_service_endpoint, BrokerEndpoints, BrokerTopology, ConfigError, PoolConfig,
};
pub use faculty::{default_catalog, FacultyEntry};
pub use message::{
    AllocationResponse, AllocationResult, CountersSnapshot, ErrorResponse, FacultyRequest,
    IncomingMessage, PingKind, PingRequest, PingResponse, Program,
};
