//! Versions (one generated variant) and run summaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uniquify_common::{now_iso, UniqError, UniqResult};

use crate::stage::EffectStage;

/// Lifecycle of a version. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Pending,
    Success,
    Error,
}

impl VersionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VersionStatus::Pending)
    }
}

/// Contents of `versions/version_NNN/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version_id: usize,
    pub effects: Vec<String>,
    pub input_file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,

    pub generated_at: String,
    pub status: VersionStatus,

    /// Backend that produced the final output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Number of chunks the input was processed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,

    /// Duration of the output in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Sampled stage parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<EffectStage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VersionMetadata {
    pub fn is_success(&self) -> bool {
        self.status == VersionStatus::Success
    }

    pub fn write_to(&self, path: &Path) -> UniqResult<()> {
        write_json(path, self)
    }

    pub fn read_from(path: &Path) -> UniqResult<Self> {
        read_json(path)
    }
}

/// What a successful version produced.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionOutput {
    pub output_file: PathBuf,
    pub file_size_bytes: u64,
    pub backend: String,
    pub chunks: usize,
    pub duration_secs: f64,
}

/// One variant inside a run. Starts `Pending`; `complete` or `fail` moves it
/// to its terminal state and may be called only once.
#[derive(Debug, Clone)]
pub struct Version {
    metadata: VersionMetadata,
}

impl Version {
    pub fn new(
        version_id: usize,
        effects: Vec<String>,
        input_file: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            metadata: VersionMetadata {
                version_id,
                effects,
                input_file: input_file.into(),
                output_file: None,
                file_size_mb: None,
                generated_at: now_iso(),
                status: VersionStatus::Pending,
                backend: None,
                chunks: None,
                duration_secs: None,
                seed: Some(seed),
                stages: Vec::new(),
                error: None,
            },
        }
    }

    pub fn id(&self) -> usize {
        self.metadata.version_id
    }

    pub fn status(&self) -> VersionStatus {
        self.metadata.status
    }

    pub fn metadata(&self) -> &VersionMetadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> VersionMetadata {
        self.metadata
    }

    /// Record the sampled stages (before processing starts).
    pub fn set_stages(&mut self, stages: Vec<EffectStage>) {
        self.metadata.stages = stages;
    }

    pub fn complete(&mut self, output: VersionOutput) -> UniqResult<()> {
        self.ensure_pending()?;
        let m = &mut self.metadata;
        m.status = VersionStatus::Success;
        m.output_file = Some(output.output_file.display().to_string());
        m.file_size_mb = Some(output.file_size_bytes as f64 / (1024.0 * 1024.0));
        m.backend = Some(output.backend);
        m.chunks = Some(output.chunks);
        m.duration_secs = Some(output.duration_secs);
        m.generated_at = now_iso();
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> UniqResult<()> {
        self.ensure_pending()?;
        let m = &mut self.metadata;
        m.status = VersionStatus::Error;
        m.error = Some(error.into());
        m.generated_at = now_iso();
        Ok(())
    }

    fn ensure_pending(&self) -> UniqResult<()> {
        if self.metadata.status.is_terminal() {
            return Err(UniqError::batch(format!(
                "version {} already finished with status {:?}",
                self.metadata.version_id, self.metadata.status
            )));
        }
        Ok(())
    }
}

/// Contents of `metadata/run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_name: String,
    pub input_video: String,
    pub total_versions: usize,
    pub successful: usize,
    pub failed: usize,
    pub run_dir: String,
    pub generated_at: String,

    #[serde(default)]
    pub started_at: String,

    #[serde(default)]
    pub elapsed_secs: f64,

    /// Per-version metadata, ordered by version id.
    pub results: Vec<VersionMetadata>,
}

impl RunSummary {
    /// Build a summary from terminal version results (any order).
    pub fn from_results(
        run_name: impl Into<String>,
        input_video: impl Into<String>,
        run_dir: &Path,
        total_versions: usize,
        mut results: Vec<VersionMetadata>,
        started_at: impl Into<String>,
        elapsed_secs: f64,
    ) -> Self {
        results.sort_by_key(|m| m.version_id);
        let successful = results.iter().filter(|m| m.is_success()).count();
        let failed = results
            .iter()
            .filter(|m| m.status == VersionStatus::Error)
            .count();
        Self {
            run_name: run_name.into(),
            input_video: input_video.into(),
            total_versions,
            successful,
            failed,
            run_dir: run_dir.display().to_string(),
            generated_at: now_iso(),
            started_at: started_at.into(),
            elapsed_secs,
            results,
        }
    }

    pub fn write_to(&self, path: &Path) -> UniqResult<()> {
        write_json(path, self)
    }

    pub fn read_from(path: &Path) -> UniqResult<Self> {
        read_json(path)
    }

    pub fn successful_versions(&self) -> impl Iterator<Item = &VersionMetadata> {
        self.results.iter().filter(|m| m.is_success())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> UniqResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> UniqResult<T> {
    if !path.exists() {
        return Err(UniqError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> VersionOutput {
        VersionOutput {
            output_file: PathBuf::from("/runs/r/versions/version_001/uniquized_v001.mp4"),
            file_size_bytes: 2 * 1024 * 1024,
            backend: "compositing".to_string(),
            chunks: 1,
            duration_secs: 9.5,
        }
    }

    #[test]
    fn test_terminal_state_is_set_once() {
        let mut version = Version::new(1, vec!["visual".into()], "in.mp4", 3);
        assert_eq!(version.status(), VersionStatus::Pending);
        version.complete(output()).unwrap();
        assert_eq!(version.status(), VersionStatus::Success);
        assert!(version.fail("late failure").is_err());
        assert!(version.complete(output()).is_err());
        assert_eq!(version.metadata().file_size_mb, Some(2.0));
    }

    #[test]
    fn test_error_metadata_omits_output_fields() {
        let mut version = Version::new(2, vec!["temporal".into()], "in.mp4", 3);
        version.fail("decoder exited").unwrap();
        let json = serde_json::to_value(version.metadata()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "decoder exited");
        assert!(json.get("output_file").is_none());
        assert!(json.get("file_size_mb").is_none());
    }

    #[test]
    fn test_summary_counts_and_order() {
        let mut ok = Version::new(2, vec![], "in.mp4", 1);
        ok.complete(output()).unwrap();
        let mut bad = Version::new(1, vec![], "in.mp4", 1);
        bad.fail("boom").unwrap();

        let summary = RunSummary::from_results(
            "run_x",
            "in.mp4",
            Path::new("/runs/run_x"),
            2,
            vec![ok.into_metadata(), bad.into_metadata()],
            now_iso(),
            1.5,
        );
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[0].version_id, 1);
        assert_eq!(summary.successful_versions().count(), 1);
    }

    #[test]
    fn test_metadata_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v").join("metadata.json");
        let mut version = Version::new(3, vec!["social".into()], "in.mp4", 8);
        version.complete(output()).unwrap();
        version.metadata().write_to(&path).unwrap();

        let loaded = VersionMetadata::read_from(&path).unwrap();
        assert_eq!(&loaded, version.metadata());
        assert!(matches!(
            VersionMetadata::read_from(&dir.path().join("missing.json")),
            Err(UniqError::FileNotFound { .. })
        ));
    }
}
