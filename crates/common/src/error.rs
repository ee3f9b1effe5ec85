//! Error types shared across Uniquify crates.

use std::path::PathBuf;

/// Top-level error type for Uniquify operations.
#[derive(Debug, thiserror::Error)]
pub enum UniqError {
    /// Container metadata (duration, fps, resolution) could not be read.
    #[error("Probe error: {message}")]
    Probe { message: String },

    /// A stage failed mid-pipeline; aborts the current backend attempt.
    #[error("Stage error in {stage}: {message}")]
    Stage { stage: String, message: String },

    /// Every backend attempt failed. `attempts` keeps one entry per backend.
    #[error("All backends failed: {}", format_attempts(.attempts))]
    Backend { attempts: Vec<(String, String)> },

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },

    #[error("Chunk extraction error (chunk {index}): {message}")]
    ChunkExtraction { index: usize, message: String },

    #[error("Merge error: {message}")]
    Merge { message: String },

    /// The batch could not even start.
    #[error("Batch error: {message}")]
    Batch { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Required tool not found on PATH: {tool}")]
    ToolMissing { tool: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using UniqError.
pub type UniqResult<T> = Result<T, UniqError>;

impl UniqError {
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
            message: msg.into(),
        }
    }

    pub fn chunk_extraction(index: usize, msg: impl Into<String>) -> Self {
        Self::ChunkExtraction {
            index,
            message: msg.into(),
        }
    }

    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge {
            message: msg.into(),
        }
    }

    pub fn batch(msg: impl Into<String>) -> Self {
        Self::Batch {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn tool_missing(tool: impl Into<String>) -> Self {
        Self::ToolMissing { tool: tool.into() }
    }

    /// Whether this error came from a cancel request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no backend was attempted".to_string();
    }
    attempts
        .iter()
        .map(|(backend, message)| format!("[{backend}] {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_lists_every_attempt() {
        let err = UniqError::Backend {
            attempts: vec![
                ("compositing".to_string(), "decode failed".to_string()),
                ("streaming".to_string(), "encoder exited".to_string()),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("[compositing] decode failed"));
        assert!(text.contains("[streaming] encoder exited"));
    }

    #[test]
    fn test_stage_error_names_stage() {
        let err = UniqError::stage("visual", "short frame");
        assert_eq!(err.to_string(), "Stage error in visual: short frame");
        assert!(!err.is_cancelled());
        assert!(UniqError::Cancelled.is_cancelled());
    }
}
