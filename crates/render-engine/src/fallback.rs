//! Ordered backend fallback.

use std::sync::Arc;

use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{Asset, PipelineSpec};

use crate::backend::{BackendSettings, ExecutionBackend};
use crate::compositing::CompositingBackend;
use crate::pipeline::{run_pipeline, PipelineContext};
use crate::probe::MediaProbe;
use crate::streaming::StreamingBackend;

/// Try `attempt` on each candidate in order and return the first success
/// together with the candidate's name.
///
/// Each candidate is tried at most once. A cancellation stops immediately.
/// When every candidate fails the result is [`UniqError::Backend`] listing
/// each failure.
pub fn first_success<C, T>(
    candidates: &[C],
    name_of: impl Fn(&C) -> String,
    mut attempt: impl FnMut(&C) -> UniqResult<T>,
) -> UniqResult<(String, T)> {
    let mut failures: Vec<(String, String)> = Vec::new();
    for candidate in candidates {
        let name = name_of(candidate);
        match attempt(candidate) {
            Ok(value) => {
                if !failures.is_empty() {
                    tracing::info!(backend = %name, failed = failures.len(), "Fallback succeeded");
                }
                return Ok((name, value));
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(backend = %name, error = %e, "Backend attempt failed");
                failures.push((name, e.to_string()));
            }
        }
    }
    Err(UniqError::Backend { attempts: failures })
}

/// Result of a fallback-coordinated pipeline run.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub asset: Asset,
    /// Name of the backend that produced `asset`.
    pub backend: String,
}

/// Runs whole pipelines under each backend in priority order.
#[derive(Clone)]
pub struct FallbackCoordinator {
    backends: Vec<Arc<dyn ExecutionBackend>>,
}

impl FallbackCoordinator {
    pub fn new(backends: Vec<Arc<dyn ExecutionBackend>>) -> Self {
        Self { backends }
    }

    /// Compositing first, streaming second.
    pub fn standard(settings: BackendSettings) -> Self {
        Self::new(vec![
            Arc::new(CompositingBackend::new(settings.clone())),
            Arc::new(StreamingBackend::new(settings)),
        ])
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Run `spec` against the original `asset` under each backend until one
    /// succeeds. Unavailable backends count as failed attempts.
    pub fn run(
        &self,
        asset: &Asset,
        spec: &PipelineSpec,
        probe: &dyn MediaProbe,
        ctx: &PipelineContext,
    ) -> UniqResult<FallbackOutcome> {
        let (backend, output) = first_success(
            &self.backends,
            |backend| backend.name().to_string(),
            |backend| {
                if !backend.is_available() {
                    return Err(UniqError::pipeline(format!(
                        "backend {} is not available on this system",
                        backend.name()
                    )));
                }
                run_pipeline(asset, spec, backend.as_ref(), probe, ctx)
            },
        )?;
        Ok(FallbackOutcome {
            asset: output,
            backend,
        })
    }
}
