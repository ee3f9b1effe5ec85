//! Progress events. Never persisted.

use serde::Serialize;
use uniquify_common::now_iso;

/// A point-in-time progress update for one stage of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// What is running (`visual`, `split`, `v003/merge`, ...).
    pub stage: String,

    /// Completion in `[0, 1]`.
    pub fraction: f64,

    pub message: String,

    /// Wall-clock time (RFC 3339).
    pub timestamp: String,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, fraction: f64, message: impl Into<String>) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            stage: stage.into(),
            fraction,
            message: message.into(),
            timestamp: now_iso(),
        }
    }

    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    pub fn is_done(&self) -> bool {
        self.fraction >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(ProgressEvent::new("x", 1.7, "").fraction, 1.0);
        assert_eq!(ProgressEvent::new("x", -0.2, "").fraction, 0.0);
        assert_eq!(ProgressEvent::new("x", f64::NAN, "").fraction, 0.0);
        assert!(ProgressEvent::new("x", 1.0, "done").is_done());
    }
}
