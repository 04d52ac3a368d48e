//! Run-history persistence.
//!
//! Every cycle's `RunResult` is appended to a JSON file so operators
//! can audit paper trades and live broadcasts after the fact. Plain
//! file storage; the history is small and append-mostly.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::RunResult;

pub struct RunStore {
    path: PathBuf,
}

impl RunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the full run history. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<RunResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read run history: {}", self.path.display()))?;
        let runs: Vec<RunResult> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse run history: {}", self.path.display()))?;
        Ok(runs)
    }

    /// Append one run and persist the whole history.
    pub fn append(&self, run: &RunResult) -> Result<()> {
        let mut runs = self.load()?;
        runs.push(run.clone());
        self.save(&runs)?;
        debug!(total = runs.len(), "Run recorded");
        Ok(())
    }

    /// The `count` most recent runs, newest last.
    pub fn recent(&self, count: usize) -> Result<Vec<RunResult>> {
        let runs = self.load()?;
        let skip = runs.len().saturating_sub(count);
        Ok(runs.into_iter().skip(skip).collect())
    }

    fn save(&self, runs: &[RunResult]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(runs).context("Failed to serialise run history")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write run history: {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
