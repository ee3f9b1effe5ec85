//! Batch generation of N variants of one input.
//!
//! ```text
//!            plan versions (pending metadata.json)
//!                        │
//!              ┌─── shared job queue ───┐
//!              ▼            ▼           ▼
//!          worker 1     worker 2 …  worker k     (scoped OS threads)
//!              │            │           │
//!              └──── results channel ───┘
//!                           ▼
//!                      aggregator ──► run_summary.json
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use serde::{Deserialize, Serialize};
use uniquify_common::{AppConfig, CancelToken, Stopwatch, UniqError, UniqResult};
use uniquify_model::{
    default_run_name, derive_seed, validate_run_name, version_label, EffectKind, PipelineSpec,
    RunLayout, RunSummary, Version, VersionMetadata, VersionOutput,
};
use uniquify_render_engine::{emit, ScopedProgress, SharedProgress, VideoProcessor};

/// How versions are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Concurrency {
    /// Bounded worker pool.
    #[default]
    Parallel,
    /// One worker, versions in id order.
    Sequential,
}

/// Effect combinations cycled through by version id.
pub fn default_palette() -> Vec<Vec<EffectKind>> {
    use EffectKind::{Social, Temporal, Visual};
    vec![
        vec![Temporal],
        vec![Social],
        vec![Visual],
        vec![Temporal, Social],
        vec![Temporal, Visual],
        vec![Social, Visual],
        vec![Temporal, Social, Visual],
    ]
}

/// Everything `generate` needs to know about one run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub input: PathBuf,
    pub versions: usize,
    pub run_name: Option<String>,
    pub palette: Vec<Vec<EffectKind>>,
    pub concurrency: Concurrency,
    pub max_workers: usize,

    /// Run seed; random when unset.
    pub seed: Option<u64>,
}

impl GenerateRequest {
    pub fn new(input: impl Into<PathBuf>, versions: usize) -> Self {
        Self {
            input: input.into(),
            versions,
            run_name: None,
            palette: default_palette(),
            concurrency: Concurrency::Parallel,
            max_workers: 4,
            seed: None,
        }
    }

    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    pub fn with_palette(mut self, palette: Vec<Vec<EffectKind>>) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Effect combination for a 1-based version id; `None` for id 0 or an
    /// empty palette.
    pub fn combination(&self, version_id: usize) -> Option<&[EffectKind]> {
        let offset = version_id.checked_sub(1)?;
        self.palette
            .get(offset.checked_rem(self.palette.len())?)
            .map(Vec::as_slice)
    }

    pub fn worker_count(&self) -> usize {
        match self.concurrency {
            Concurrency::Sequential => 1,
            Concurrency::Parallel => self.versions.min(self.max_workers).max(1),
        }
    }

    fn validate(&self) -> UniqResult<()> {
        if self.versions == 0 {
            return Err(UniqError::batch("at least one version is required"));
        }
        if self.palette.is_empty() {
            return Err(UniqError::batch("effect palette is empty"));
        }
        if self.palette.iter().any(Vec::is_empty) {
            return Err(UniqError::batch("effect palette contains an empty combination"));
        }
        if let Some(name) = &self.run_name {
            validate_run_name(name)?;
        }
        Ok(())
    }
}

struct VersionJob {
    version: Version,
    spec: PipelineSpec,
}

/// Runs batch generations under `<output_root>/runs/`.
#[derive(Clone)]
pub struct BatchOrchestrator {
    output_root: PathBuf,
    processor: VideoProcessor,
}

impl BatchOrchestrator {
    pub fn new(output_root: impl Into<PathBuf>, processor: VideoProcessor) -> Self {
        Self {
            output_root: output_root.into(),
            processor,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.output_dir, VideoProcessor::from_config(config))
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        let options = self.processor.options().clone().with_cancel(cancel);
        self.processor = self.processor.with_options(options);
        self
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        let options = self.processor.options().clone().with_progress(progress);
        self.processor = self.processor.with_options(options);
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Generate `request.versions` variants of `request.input`.
    ///
    /// Fails only if the run cannot start. Individual version failures
    /// (errors or panics) are recorded in that version's metadata and in the
    /// summary.
    pub fn generate(&self, request: &GenerateRequest) -> UniqResult<RunSummary> {
        let stopwatch = Stopwatch::start();
        request.validate()?;

        let source = self
            .processor
            .probe()
            .probe(&request.input)
            .map_err(|e| UniqError::batch(format!("cannot read input: {e}")))?;

        let run_name = request.run_name.clone().unwrap_or_else(default_run_name);
        let layout = RunLayout::new(&self.output_root, &run_name);
        layout.create().map_err(|e| {
            UniqError::batch(format!(
                "cannot create run directory {}: {e}",
                layout.run_dir().display()
            ))
        })?;

        let run_seed = request.seed.unwrap_or_else(rand::random);
        let jobs = self.plan(request, &layout, run_seed)?;
        let total = jobs.len();
        let workers = request.worker_count();
        tracing::info!(
            run = %run_name,
            input = %source.path.display(),
            versions = total,
            workers,
            seed = run_seed,
            "Starting batch run"
        );

        let queue = Mutex::new(VecDeque::from(jobs));
        let (tx, rx) = mpsc::channel::<VersionMetadata>();
        let results = std::thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let layout = &layout;
                let input = source.path.as_path();
                scope.spawn(move || self.worker_loop(worker, queue, layout, input, tx));
            }
            drop(tx);
            self.aggregate(rx, total)
        });

        let summary = RunSummary::from_results(
            &run_name,
            request.input.display().to_string(),
            &layout.run_dir(),
            total,
            results,
            stopwatch.started_at(),
            stopwatch.elapsed_secs(),
        );
        summary.write_to(&layout.summary_path())?;
        tracing::info!(
            run = %run_name,
            successful = summary.successful,
            failed = summary.failed,
            elapsed_secs = summary.elapsed_secs,
            "Batch run finished"
        );
        Ok(summary)
    }

    /// [`generate`](Self::generate) on tokio's blocking pool.
    pub async fn generate_async(&self, request: GenerateRequest) -> UniqResult<RunSummary> {
        let orchestrator = self.clone();
        tokio::task::spawn_blocking(move || orchestrator.generate(&request))
            .await
            .map_err(|e| UniqError::batch(format!("batch task failed: {e}")))?
    }

    fn plan(
        &self,
        request: &GenerateRequest,
        layout: &RunLayout,
        run_seed: u64,
    ) -> UniqResult<Vec<VersionJob>> {
        let input_file = request.input.display().to_string();
        (1..=request.versions)
            .map(|id| {
                let seed = derive_seed(run_seed, id as u64);
                let kinds = request
                    .combination(id)
                    .ok_or_else(|| UniqError::batch("effect palette is empty"))?;
                let spec = PipelineSpec::build(kinds, seed);
                let mut version = Version::new(id, spec.effect_names(), &input_file, seed);
                version.set_stages(spec.stages().to_vec());

                layout.create_version_dir(id).map_err(|e| {
                    UniqError::batch(format!("cannot create {}: {e}", version_label(id)))
                })?;
                version
                    .metadata()
                    .write_to(&layout.version_metadata_path(id))
                    .map_err(|e| {
                        UniqError::batch(format!("cannot write {} metadata: {e}", version_label(id)))
                    })?;
                Ok(VersionJob { version, spec })
            })
            .collect()
    }

    fn worker_loop(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<VersionJob>>,
        layout: &RunLayout,
        input: &Path,
        tx: mpsc::Sender<VersionMetadata>,
    ) {
        loop {
            let job = match queue.lock() {
                Ok(mut jobs) => jobs.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some(job) = job else {
                break;
            };
            tracing::debug!(worker, version = job.version.id(), "Version picked up");
            let metadata = self.run_version(job, layout, input);
            if tx.send(metadata).is_err() {
                break;
            }
        }
    }

    fn run_version(&self, job: VersionJob, layout: &RunLayout, input: &Path) -> VersionMetadata {
        let VersionJob { mut version, spec } = job;
        let id = version.id();

        let result = if self.processor.options().cancel.is_cancelled() {
            Err(UniqError::Cancelled)
        } else {
            catch_unwind(AssertUnwindSafe(|| {
                self.render_version(id, &spec, layout, input)
            }))
            .unwrap_or_else(|payload| {
                Err(UniqError::pipeline(format!(
                    "worker panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
        };

        let transition = match result {
            Ok(output) => {
                tracing::info!(
                    version = id,
                    backend = %output.backend,
                    chunks = output.chunks,
                    "Version complete"
                );
                version.complete(output)
            }
            Err(e) => {
                tracing::warn!(version = id, error = %e, "Version failed");
                version.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            tracing::warn!(version = id, error = %e, "Version state not updated");
        }

        if let Err(e) = version
            .metadata()
            .write_to(&layout.version_metadata_path(id))
        {
            tracing::warn!(version = id, error = %e, "Failed to write version metadata");
        }
        version.into_metadata()
    }

    fn render_version(
        &self,
        id: usize,
        spec: &PipelineSpec,
        layout: &RunLayout,
        input: &Path,
    ) -> UniqResult<VersionOutput> {
        let dir = layout.create_version_dir(id)?;
        let workspace = tempfile::Builder::new().prefix(".work-").tempdir_in(&dir)?;
        let output = layout.output_path(id);

        let options = self.processor.options().clone();
        let scoped: SharedProgress = Arc::new(ScopedProgress::new(
            version_label(id),
            options.progress.clone(),
        ));
        let processor = self.processor.clone().with_options(options.with_progress(scoped));
        let report = processor.process_in(input, &output, spec, workspace.path())?;

        Ok(VersionOutput {
            output_file: report.output,
            file_size_bytes: report.file_size_bytes,
            backend: report.backend,
            chunks: report.chunks,
            duration_secs: report.duration_secs,
        })
    }

    fn aggregate(&self, rx: mpsc::Receiver<VersionMetadata>, total: usize) -> Vec<VersionMetadata> {
        let progress = self.processor.options().progress.clone();
        let mut results = Vec::with_capacity(total);
        for metadata in rx {
            results.push(metadata);
            emit(
                progress.as_ref(),
                "batch",
                results.len() as f64 / total as f64,
                format!("{}/{total} versions finished", results.len()),
            );
        }
        if results.len() < total {
            tracing::warn!(
                finished = results.len(),
                total,
                "Some versions never reported a result"
            );
        }
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
