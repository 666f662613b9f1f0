// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The allocation policy itself: pure arithmetic over one program's request
//! against one term's counters.
//!
//! Grounded in `procesar_programa` from the original worker: labs are
//! satisfied from the lab pool first, falling back to substituting
//! classroom units when labs are exhausted, then classroom demand is
//! satisfied from whatever classrooms remain. Kept as a pure function so it
//! can be tested without touching the counter store.

use aulas_proto::{AllocationResult, CountersSnapshot, Program};

/// Apply one program's request to `counters`, returning the updated
/// counters and the result row to report back to the faculty.
///
/// Caller is responsible for holding the counter-store lease for `counters`'
/// term for the duration of this call; this function only does the
/// arithmetic, it does not touch storage.
pub fn apply_program(
    counters: CountersSnapshot,
    faculty: &str,
    program: &Program,
) -> (CountersSnapshot, AllocationResult) {
    let mut classrooms_available = counters.classrooms_available;
    let mut labs_available = counters.labs_available;

    let mut labs_assigned = 0;
    let mut classrooms_assigned = 0;
    let mut classrooms_as_labs = 0;

    // Lab demand: labs first, classrooms as substitute, otherwise denied.
    if labs_available >= program.labs {
        labs_available -= program.labs;
        labs_assigned = program.labs;
    } else if classrooms_available >= program.labs {
        classrooms_available -= program.labs;
        classrooms_assigned += program.labs;
        classrooms_as_labs = program.labs;
    }

    // Classroom demand, evaluated after any lab-substitution above.
    if classrooms_available >= program.classrooms {
        classrooms_available -= program.classrooms;
        classrooms_assigned += program.classrooms;
    }

    let result = AllocationResult {
        faculty: faculty.to_string(),
        program: program.name.clone(),
        classrooms_requested: program.classrooms,
        labs_requested: program.labs,
        classrooms_assigned,
        labs_assigned,
        classrooms_as_labs,
    };

    let updated = CountersSnapshot {
        classrooms_available,
        labs_available,
    };

    (updated, result)
}
