//! Read-only view over finished runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{validate_run_name, RunLayout, RunSummary};

/// Lists and loads run summaries under `<base>/runs/`.
#[derive(Debug, Clone)]
pub struct RunStore {
    base: PathBuf,
}

impl RunStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn runs_root(&self) -> PathBuf {
        RunLayout::runs_root(&self.base)
    }

    /// Every run with a readable summary, newest first. Runs without a
    /// summary (still in progress or aborted) are skipped.
    pub fn list_runs(&self) -> UniqResult<Vec<RunSummary>> {
        let root = self.runs_root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.run_info(&name) {
                Ok(summary) => runs.push(summary),
                Err(UniqError::FileNotFound { .. }) => {
                    tracing::debug!(run = %name, "Run has no summary yet");
                }
                Err(e) => {
                    tracing::warn!(run = %name, error = %e, "Unreadable run summary");
                }
            }
        }

        runs.sort_by(|a, b| {
            sort_key(&b.generated_at)
                .cmp(&sort_key(&a.generated_at))
                .then_with(|| b.run_name.cmp(&a.run_name))
        });
        Ok(runs)
    }

    /// Summary of one run.
    pub fn run_info(&self, run_name: &str) -> UniqResult<RunSummary> {
        validate_run_name(run_name)?;
        RunSummary::read_from(&self.summary_path(run_name))
    }

    /// Most recently generated run, if any.
    pub fn latest(&self) -> UniqResult<Option<RunSummary>> {
        Ok(self.list_runs()?.into_iter().next())
    }

    fn summary_path(&self, run_name: &str) -> PathBuf {
        RunLayout::new(&self.base, run_name).summary_path()
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

fn sort_key(timestamp: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(timestamp).ok()
}
