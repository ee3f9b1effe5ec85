//! Interfaces to the outside world a finished run is handed to: a storage
//! uploader, a human approval step, and a delivery channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{version_label, RunSummary, VersionMetadata};

/// Remote storage. Uploading the same file to the same remote path twice
/// must be harmless.
#[async_trait]
pub trait Uploader: Send + Sync {
    fn name(&self) -> &str;

    /// Upload `local` to `remote`; returns the stored location.
    async fn upload(&self, local: &Path, remote: &str) -> UniqResult<String>;
}

/// Outcome of an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

#[async_trait]
pub trait ApprovalWorkflow: Send + Sync {
    async fn request(
        &self,
        version_id: usize,
        metadata: &VersionMetadata,
    ) -> UniqResult<ApprovalDecision>;
}

/// Best-effort delivery of a finished file to a person or channel.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, file: &Path, caption: &str) -> UniqResult<()>;
}

/// Copies uploads into a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirUploader {
    root: PathBuf,
}

impl LocalDirUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Uploader for LocalDirUploader {
    fn name(&self) -> &str {
        "local-dir"
    }

    async fn upload(&self, local: &Path, remote: &str) -> UniqResult<String> {
        let destination = self.root.join(remote.trim_start_matches('/'));
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &destination).await?;
        Ok(destination.display().to_string())
    }
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalWorkflow for AutoApprove {
    async fn request(&self, _: usize, _: &VersionMetadata) -> UniqResult<ApprovalDecision> {
        Ok(ApprovalDecision::Approved)
    }
}

/// Logs deliveries instead of sending them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryChannel for LogDelivery {
    async fn deliver(&self, file: &Path, caption: &str) -> UniqResult<()> {
        tracing::info!(file = %file.display(), caption, "Delivered");
        Ok(())
    }
}

/// The three collaborators `publish_run` talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub uploader: Arc<dyn Uploader>,
    pub approval: Arc<dyn ApprovalWorkflow>,
    pub delivery: Arc<dyn DeliveryChannel>,
}

impl Collaborators {
    /// Local uploads, auto-approval, log delivery.
    pub fn local(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            uploader: Arc::new(LocalDirUploader::new(upload_root)),
            approval: Arc::new(AutoApprove),
            delivery: Arc::new(LogDelivery),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOptions {
    /// Upload attempts per version, at least one.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub version_id: usize,
    pub remote_path: String,
    pub location: String,
    pub attempts: u32,
}

/// What happened to each successful version of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub run_name: String,
    pub delivered: Vec<usize>,
    pub uploaded: Vec<UploadRecord>,
    pub rejected: Vec<(usize, String)>,
    pub failed: Vec<(usize, String)>,
}

/// Remote path of a version: `<remote_root>/<run>/version_NNN.mp4`.
pub fn remote_path(remote_root: &str, run_name: &str, version_id: usize) -> String {
    let root = remote_root.trim_end_matches('/');
    let file = format!("{}.mp4", version_label(version_id));
    if root.is_empty() {
        format!("{run_name}/{file}")
    } else {
        format!("{root}/{run_name}/{file}")
    }
}

/// Deliver, approve and upload every successful version of `summary`.
///
/// Delivery failures are logged and ignored. Uploads are retried up to
/// `options.max_attempts` times. Nothing here fails the whole publish; per
/// version problems land in the report.
pub async fn publish_run(
    summary: &RunSummary,
    collaborators: &Collaborators,
    remote_root: &str,
    options: &PublishOptions,
) -> PublishReport {
    let mut report = PublishReport {
        run_name: summary.run_name.clone(),
        ..PublishReport::default()
    };

    for metadata in summary.successful_versions() {
        let id = metadata.version_id;
        let Some(file) = metadata.output_file.as_deref().map(PathBuf::from) else {
            report.failed.push((id, "no output file recorded".to_string()));
            continue;
        };

        let caption = format!(
            "{} / {}: {}",
            summary.run_name,
            version_label(id),
            metadata.effects.join(", ")
        );
        match collaborators.delivery.deliver(&file, &caption).await {
            Ok(()) => report.delivered.push(id),
            Err(e) => tracing::warn!(version = id, error = %e, "Delivery failed"),
        }

        match collaborators.approval.request(id, metadata).await {
            Ok(ApprovalDecision::Approved) => {}
            Ok(ApprovalDecision::Rejected { reason }) => {
                tracing::info!(version = id, reason = %reason, "Version rejected");
                report.rejected.push((id, reason));
                continue;
            }
            Err(e) => {
                tracing::warn!(version = id, error = %e, "Approval request failed");
                report.failed.push((id, format!("approval: {e}")));
                continue;
            }
        }

        let remote = remote_path(remote_root, &summary.run_name, id);
        match upload_with_retry(collaborators.uploader.as_ref(), &file, &remote, options).await {
            Ok((location, attempts)) => report.uploaded.push(UploadRecord {
                version_id: id,
                remote_path: remote,
                location,
                attempts,
            }),
            Err(e) => report.failed.push((id, e.to_string())),
        }
    }

    tracing::info!(
        run = %report.run_name,
        uploaded = report.uploaded.len(),
        rejected = report.rejected.len(),
        failed = report.failed.len(),
        "Run published"
    );
    report
}

async fn upload_with_retry(
    uploader: &dyn Uploader,
    file: &Path,
    remote: &str,
    options: &PublishOptions,
) -> UniqResult<(String, u32)> {
    let max_attempts = options.max_attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=max_attempts {
        match uploader.upload(file, remote).await {
            Ok(location) => return Ok((location, attempt)),
            Err(e) => {
                tracing::warn!(
                    uploader = uploader.name(),
                    remote,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Upload attempt failed"
                );
                last_error = Some(e);
                if attempt < max_attempts {
                    tokio::time::sleep(options.retry_delay).await;
                }
            }
        }
    }
    Err(UniqError::pipeline(format!(
        "upload to {remote} failed after {max_attempts} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
