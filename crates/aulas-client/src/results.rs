// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persisted result files: `state_asignaciones.json` and
//! `asignacion_completa_<term>.json`, merged under a shared lock file so
//! concurrent faculty listeners never clobber each other's writes.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use aulas_proto::{AllocationResult, CountersSnapshot};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("failed to acquire results lock: {0}")]
    Lock(String),
    #[error("io error on {0}: {1}")]
    Io(PathBuf, String),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile(HashMap<String, CountersSnapshot>);

/// Owns the `results/` directory and its shared lock file.
pub struct ResultStore {
    dir: PathBuf,
    lock_path: PathBuf,
}

impl ResultStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ResultsError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| ResultsError::Io(dir.clone(), e.to_string()))?;
        let lock_path = dir.join("lock");
        Ok(Self { dir, lock_path })
    }

    fn lock(&self) -> Result<File, ResultsError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| ResultsError::Io(self.lock_path.clone(), e.to_string()))?;
        file.lock_exclusive()
            .map_err(|e| ResultsError::Lock(e.to_string()))?;
        Ok(file)
    }

    /// Overwrite `term`'s entry in `state_asignaciones.json`, leaving every
    /// other term's entry untouched.
    pub fn write_state(&self, term: &str, snapshot: CountersSnapshot) -> Result<(), ResultsError> {
        let file = self.lock()?;
        let path = self.dir.join("state_asignaciones.json");
        let mut state = read_json::<StateFile>(&path)?.unwrap_or_default();
        state.0.insert(term.to_string(), snapshot);
        write_json(&path, &state)?;
        fs2::FileExt::unlock(&file).ok();
        Ok(())
    }

    /// Merge `results` into `asignacion_completa_<term>.json`, keyed by
    /// `(faculty, program)`: a repeated key replaces the prior row rather
    /// than appending a duplicate.
    pub fn merge_allocation(
        &self,
        term: &str,
        results: &[AllocationResult],
    ) -> Result<(), ResultsError> {
        let file = self.lock()?;
        let path = self.dir.join(format!("asignacion_completa_{term}.json"));
        let existing = read_json::<Vec<AllocationResult>>(&path)?.unwrap_or_default();

        let mut merged: Vec<AllocationResult> = existing;
        for incoming in results {
            match merged
                .iter_mut()
                .find(|r| r.faculty == incoming.faculty && r.program == incoming.program)
            {
                Some(slot) => *slot = incoming.clone(),
                None => merged.push(incoming.clone()),
            }
        }

        write_json(&path, &merged)?;
        fs2::FileExt::unlock(&file).ok();
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ResultsError> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| ResultsError::Io(path.to_owned(), e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ResultsError::Parse(path.to_owned(), e.to_string()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ResultsError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| ResultsError::Parse(path.to_owned(), e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ResultsError::Io(path.to_owned(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(faculty: &str, program: &str, classrooms_assigned: u32) -> AllocationResult {
        AllocationResult {
            faculty: faculty.to_string(),
            program: program.to_string(),
            classrooms_requested: classrooms_assigned,
            labs_requested: 0,
            classrooms_assigned,
            labs_assigned: 0,
            classrooms_as_labs: 0,
        }
    }

    #[test]
    fn merge_appends_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .merge_allocation("2025-1", &[result("F", "A", 7)])
            .unwrap();
        store
            .merge_allocation("2025-1", &[result("F", "B", 3)])
            .unwrap();

        let path = dir.path().join("asignacion_completa_2025-1.json");
        let saved: Vec<AllocationResult> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[test]
    fn merge_replaces_existing_key_rather_than_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .merge_allocation("2025-1", &[result("F", "A", 7)])
            .unwrap();
        store
            .merge_allocation("2025-1", &[result("F", "A", 10)])
            .unwrap();

        let path = dir.path().join("asignacion_completa_2025-1.json");
        let saved: Vec<AllocationResult> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].classrooms_assigned, 10);
    }

    #[test]
    fn write_state_preserves_other_terms() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .write_state(
                "2025-1",
                CountersSnapshot {
                    classrooms_available: 373,
                    labs_available: 57,
                },
            )
            .unwrap();
        store
            .write_state(
                "2025-2",
                CountersSnapshot {
                    classrooms_available: 380,
                    labs_available: 60,
                },
            )
            .unwrap();

        let path = dir.path().join("state_asignaciones.json");
        let state: StateFile =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(state.0.len(), 2);
        assert_eq!(state.0["2025-1"].classrooms_available, 373);
    }
}
