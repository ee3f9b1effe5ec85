//! Single-video processing: probe, optional compression, split, per-chunk
//! fallback-protected pipeline, merge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uniquify_common::{
    AppConfig, CancelToken, ChunkingConfig, CompressionConfig, Stopwatch, UniqError, UniqResult,
};
use uniquify_model::{Chunk, PipelineSpec};

use crate::backend::BackendSettings;
use crate::chunk::{merge_with, ChunkSplitter, ChunkTool, FfmpegChunkTool};
use crate::compress::compress_if_needed;
use crate::fallback::FallbackCoordinator;
use crate::pipeline::PipelineContext;
use crate::probe::{FfprobeProbe, MediaProbe};
use crate::progress::{emit, NullProgress, ScopedProgress, SharedProgress};

/// Knobs for one processing run.
#[derive(Clone)]
pub struct ProcessOptions {
    pub chunking: ChunkingConfig,
    pub compression: CompressionConfig,
    pub cancel: CancelToken,
    pub progress: SharedProgress,
}

impl ProcessOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunking: config.chunking.clone(),
            compression: config.compression.clone(),
            cancel: CancelToken::new(),
            progress: Arc::new(NullProgress),
        }
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

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What a processing run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub output: PathBuf,

    /// Backend that rendered the chunks; distinct names joined with `+` in
    /// chunk order when chunks fell back differently.
    pub backend: String,

    pub chunks: usize,

    pub duration_secs: f64,

    pub file_size_bytes: u64,

    pub elapsed_secs: f64,
}

/// Chunk-aware, fallback-protected processor for single videos.
#[derive(Clone)]
pub struct VideoProcessor {
    coordinator: FallbackCoordinator,
    probe: Arc<dyn MediaProbe>,
    chunk_tool: Arc<dyn ChunkTool>,
    options: ProcessOptions,
}

impl VideoProcessor {
    pub fn new(
        coordinator: FallbackCoordinator,
        probe: Arc<dyn MediaProbe>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            coordinator,
            probe,
            chunk_tool: Arc::new(FfmpegChunkTool),
            options,
        }
    }

    /// Standard backends and ffprobe, configured from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            FallbackCoordinator::standard(BackendSettings::from_config(config)),
            Arc::new(FfprobeProbe),
            ProcessOptions::from_config(config),
        )
    }

    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the segment extractor and merger (ffmpeg by default).
    pub fn with_chunk_tool(mut self, chunk_tool: Arc<dyn ChunkTool>) -> Self {
        self.chunk_tool = chunk_tool;
        self
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn probe(&self) -> &dyn MediaProbe {
        self.probe.as_ref()
    }

    /// Process `input` into `output` using a scratch directory next to the
    /// output, removed afterwards.
    pub fn process(
        &self,
        input: &Path,
        output: &Path,
        spec: &PipelineSpec,
    ) -> UniqResult<ProcessReport> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let workspace = tempfile::Builder::new()
            .prefix(".uniquify-work-")
            .tempdir_in(parent)?;
        self.process_in(input, output, spec, workspace.path())
    }

    /// Process `input` into `output`, keeping all intermediates in
    /// `workspace`.
    pub fn process_in(
        &self,
        input: &Path,
        output: &Path,
        spec: &PipelineSpec,
        workspace: &Path,
    ) -> UniqResult<ProcessReport> {
        let stopwatch = Stopwatch::start();
        let cancel = &self.options.cancel;
        let progress = &self.options.progress;
        if spec.is_empty() {
            return Err(UniqError::pipeline("pipeline has no stages"));
        }
        cancel.check()?;

        let source = self.probe.probe(input)?;
        let asset = compress_if_needed(
            &source,
            &self.options.compression,
            workspace,
            self.probe.as_ref(),
        )?;

        let chunks = if self.options.chunking.enabled {
            ChunkSplitter::new(self.options.chunking.max_chunk_duration_secs).split_with(
                &asset,
                &workspace.join("chunks"),
                |span, out| self.chunk_tool.extract(&asset.path, span, out),
            )?
        } else {
            vec![Chunk::identity(&asset.path, asset.duration_secs)]
        };
        let total = chunks.len();
        tracing::info!(
            input = %input.display(),
            chunks = total,
            stages = spec.len(),
            "Processing video"
        );

        let mut processed = Vec::with_capacity(total);
        let mut backends: Vec<String> = Vec::new();
        for chunk in &chunks {
            cancel.check()?;
            let chunk_asset = if chunk.owned {
                self.probe.probe(&chunk.path)?
            } else {
                asset.clone()
            };
            let ctx = PipelineContext::new(workspace)
                .with_label(format!("chunk{:03}", chunk.index))
                .with_cancel(cancel.clone())
                .with_progress(Arc::new(ScopedProgress::new(
                    format!("chunk {}/{total}", chunk.index + 1),
                    progress.clone(),
                )));

            let outcome = self
                .coordinator
                .run(&chunk_asset, spec, self.probe.as_ref(), &ctx)?;
            tracing::debug!(
                chunk = chunk.index,
                backend = %outcome.backend,
                "Chunk processed"
            );
            if !backends.contains(&outcome.backend) {
                backends.push(outcome.backend.clone());
            }
            processed.push(chunk.with_path(&outcome.asset.path));
            emit(
                progress.as_ref(),
                "chunks",
                processed.len() as f64 / total as f64,
                format!("{}/{total} chunks", processed.len()),
            );
        }

        merge_with(&processed, output, |chunks, out| {
            self.chunk_tool.concat(chunks, out)
        })?;
        let file_size_bytes = std::fs::metadata(output)?.len();
        let duration_secs = self
            .probe
            .probe(output)
            .map(|a| a.duration_secs)
            .unwrap_or_else(|_| processed.iter().map(|c| c.duration_secs).sum());

        let report = ProcessReport {
            output: output.to_path_buf(),
            backend: backends.join("+"),
            chunks: total,
            duration_secs,
            file_size_bytes,
            elapsed_secs: stopwatch.elapsed_secs(),
        };
        tracing::info!(
            output = %report.output.display(),
            backend = %report.backend,
            chunks = report.chunks,
            duration_secs = report.duration_secs,
            elapsed_secs = report.elapsed_secs,
            "Video processed"
        );
        Ok(report)
    }
}

/// Process one video with the configured standard backends.
pub fn process_video(
    input: &Path,
    output: &Path,
    spec: &PipelineSpec,
    config: &AppConfig,
) -> UniqResult<ProcessReport> {
    VideoProcessor::from_config(config).process(input, output, spec)
}

/// [`process_video`] on tokio's blocking pool.
pub async fn process_video_async(
    input: PathBuf,
    output: PathBuf,
    spec: PipelineSpec,
    config: AppConfig,
) -> UniqResult<ProcessReport> {
    tokio::task::spawn_blocking(move || process_video(&input, &output, &spec, &config))
        .await
        .map_err(|e| UniqError::pipeline(format!("processing task failed: {e}")))?
}
