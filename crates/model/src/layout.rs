//! On-disk layout of runs.
//!
//! ```text
//! <base>/runs/<run_name>/versions/version_NNN/uniquized_vNNN.mp4
//! <base>/runs/<run_name>/versions/version_NNN/metadata.json
//! <base>/runs/<run_name>/metadata/run_summary.json
//! ```

use std::path::{Component, Path, PathBuf};

use uniquify_common::{run_stamp, UniqError, UniqResult};

pub const RUNS_DIR: &str = "runs";
pub const VERSIONS_DIR: &str = "versions";
pub const METADATA_DIR: &str = "metadata";
pub const SUMMARY_FILE: &str = "run_summary.json";
pub const VERSION_METADATA_FILE: &str = "metadata.json";

/// Default run name: `run_YYYYmmdd_HHMMSS` in local time.
pub fn default_run_name() -> String {
    format!("run_{}", run_stamp())
}

/// A run name must be a single plain directory name so the run stays under
/// `<base>/runs/`.
pub fn validate_run_name(name: &str) -> UniqResult<()> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || name.contains(['/', '\\']) {
        return Err(UniqError::batch(format!(
            "invalid run name {name:?}: must be a single directory name"
        )));
    }
    Ok(())
}

/// `version_007`
pub fn version_label(version_id: usize) -> String {
    format!("version_{version_id:03}")
}

/// `uniquized_v007.mp4`
pub fn output_file_name(version_id: usize) -> String {
    format!("uniquized_v{version_id:03}.mp4")
}

/// Paths for one run under a base output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    base: PathBuf,
    run_name: String,
}

impl RunLayout {
    pub fn new(base: impl Into<PathBuf>, run_name: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            run_name: run_name.into(),
        }
    }

    /// `<base>/runs`
    pub fn runs_root(base: &Path) -> PathBuf {
        base.join(RUNS_DIR)
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn run_dir(&self) -> PathBuf {
        Self::runs_root(&self.base).join(&self.run_name)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.run_dir().join(VERSIONS_DIR)
    }

    pub fn version_dir(&self, version_id: usize) -> PathBuf {
        self.versions_dir().join(version_label(version_id))
    }

    pub fn output_path(&self, version_id: usize) -> PathBuf {
        self.version_dir(version_id)
            .join(output_file_name(version_id))
    }

    pub fn version_metadata_path(&self, version_id: usize) -> PathBuf {
        self.version_dir(version_id).join(VERSION_METADATA_FILE)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.run_dir().join(METADATA_DIR)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.metadata_dir().join(SUMMARY_FILE)
    }

    /// Create the run directory skeleton (`versions/`, `metadata/`).
    pub fn create(&self) -> UniqResult<()> {
        std::fs::create_dir_all(self.versions_dir())?;
        std::fs::create_dir_all(self.metadata_dir())?;
        Ok(())
    }

    /// Create one version's directory.
    pub fn create_version_dir(&self, version_id: usize) -> UniqResult<PathBuf> {
        let dir = self.version_dir(version_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = RunLayout::new("/out", "run_a");
        assert_eq!(layout.run_dir(), PathBuf::from("/out/runs/run_a"));
        assert_eq!(
            layout.output_path(7),
            PathBuf::from("/out/runs/run_a/versions/version_007/uniquized_v007.mp4")
        );
        assert_eq!(
            layout.version_metadata_path(12),
            PathBuf::from("/out/runs/run_a/versions/version_012/metadata.json")
        );
        assert_eq!(
            layout.summary_path(),
            PathBuf::from("/out/runs/run_a/metadata/run_summary.json")
        );
    }

    #[test]
    fn test_run_name_must_stay_under_runs() {
        for bad in ["", ".", "..", "../x", "a/b", "/tmp/run", "run\\..\\x", "run/"] {
            assert!(
                matches!(validate_run_name(bad), Err(UniqError::Batch { .. })),
                "accepted {bad:?}"
            );
        }
        for good in ["run_20240101_120000", "campaign.v2", "my run"] {
            assert!(validate_run_name(good).is_ok(), "rejected {good:?}");
        }
        assert!(validate_run_name(&default_run_name()).is_ok());
    }

    #[test]
    fn test_default_run_name_shape() {
        let name = default_run_name();
        assert!(name.starts_with("run_"));
        assert_eq!(name.len(), "run_20240101_000000".len());
    }

    #[test]
    fn test_create_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "r1");
        layout.create().unwrap();
        assert!(layout.versions_dir().is_dir());
        assert!(layout.metadata_dir().is_dir());
        let version_dir = layout.create_version_dir(1).unwrap();
        assert!(version_dir.ends_with("version_001"));
    }
}
