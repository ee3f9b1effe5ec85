//! Runs a pipeline's stages in order through one backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uniquify_common::{CancelToken, UniqError, UniqResult};
use uniquify_model::{Asset, PipelineSpec};

use crate::backend::ExecutionBackend;
use crate::probe::MediaProbe;
use crate::progress::{emit, NullProgress, SharedProgress};

/// Where and how a pipeline runs.
#[derive(Clone)]
pub struct PipelineContext {
    /// Scratch directory for intermediates (the version or process workspace).
    pub workspace: PathBuf,

    /// Prefix for intermediate file names (e.g. `chunk003`).
    pub label: String,

    pub cancel: CancelToken,

    pub progress: SharedProgress,
}

impl PipelineContext {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            label: "clip".to_string(),
            cancel: CancelToken::new(),
            progress: Arc::new(NullProgress),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }
}

/// Apply every stage of `spec` to `asset`, in order, using `backend`.
///
/// Each stage writes a new file in the workspace. Once a stage succeeds the
/// previous intermediate is deleted; the original input never is. On failure
/// every intermediate created so far is removed. The caller owns the returned
/// asset's file and is expected to move it somewhere permanent.
pub fn run_pipeline(
    asset: &Asset,
    spec: &PipelineSpec,
    backend: &dyn ExecutionBackend,
    probe: &dyn MediaProbe,
    ctx: &PipelineContext,
) -> UniqResult<Asset> {
    if spec.is_empty() {
        return Err(UniqError::pipeline("pipeline has no stages"));
    }

    let mut current = asset.clone();
    let mut intermediate: Option<PathBuf> = None;
    let mut created: Vec<PathBuf> = Vec::new();

    for (index, stage) in spec.stages().iter().enumerate() {
        if let Err(e) = ctx.cancel.check() {
            remove_all(&created);
            return Err(e);
        }

        let output = ctx.workspace.join(format!(
            "{}_{}_s{:02}_{}.mp4",
            ctx.label,
            backend.name(),
            index,
            stage.name()
        ));
        created.push(output.clone());
        emit(
            ctx.progress.as_ref(),
            stage.name(),
            0.0,
            format!("stage {}/{} via {}", index + 1, spec.len(), backend.name()),
        );

        let result = backend
            .apply_stage(stage, &current, &output, ctx.progress.as_ref())
            .and_then(|_| probe.probe(&output));

        match result {
            Ok(next) => {
                tracing::debug!(
                    stage = stage.name(),
                    index,
                    backend = backend.name(),
                    duration_secs = next.duration_secs,
                    "Stage complete"
                );
                if let Some(previous) = intermediate.replace(output) {
                    remove_quietly(&previous);
                }
                current = next;
            }
            Err(e) => {
                tracing::debug!(
                    stage = stage.name(),
                    index,
                    backend = backend.name(),
                    error = %e,
                    "Stage failed"
                );
                remove_all(&created);
                return Err(e);
            }
        }
    }

    Ok(current)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        remove_quietly(path);
    }
}

/// Delete a scratch file; failures are logged and ignored.
pub(crate) fn remove_quietly(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
    }
}
