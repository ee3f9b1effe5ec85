//! Probed media assets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uniquify_common::{UniqError, UniqResult};

/// Rational frame rate as reported by the container (e.g. `30000/1001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self {
            num,
            den: den.max(1),
        }
    }

    /// Whole-number rate (`30/1`).
    pub fn integer(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den.max(1) as f64
    }

    /// Duration of a single frame in seconds.
    pub fn frame_duration_secs(&self) -> f64 {
        if self.num == 0 {
            return 0.0;
        }
        self.den as f64 / self.num as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = UniqError;

    /// Parses `num/den` or a bare number (`25`, `29.97`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once('/') {
            let num: u32 = num
                .trim()
                .parse()
                .map_err(|_| UniqError::probe(format!("invalid frame rate '{s}'")))?;
            let den: u32 = den
                .trim()
                .parse()
                .map_err(|_| UniqError::probe(format!("invalid frame rate '{s}'")))?;
            if den == 0 {
                return Err(UniqError::probe(format!("invalid frame rate '{s}'")));
            }
            return Ok(Self::new(num, den));
        }

        let value: f64 = s
            .parse()
            .map_err(|_| UniqError::probe(format!("invalid frame rate '{s}'")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(UniqError::probe(format!("invalid frame rate '{s}'")));
        }
        if value.fract() == 0.0 {
            Ok(Self::integer(value as u32))
        } else {
            Ok(Self::new((value * 1000.0).round() as u32, 1000))
        }
    }
}

/// A media file plus the container metadata read from it.
///
/// Assets are never edited in place: a stage produces a new file which is
/// probed again into a new `Asset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub path: PathBuf,

    /// Container duration in seconds.
    pub duration_secs: f64,

    pub fps: FrameRate,

    pub width: u32,
    pub height: u32,

    /// Video codec name (e.g. `h264`).
    pub codec: String,

    pub has_audio: bool,
}

impl Asset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames the asset holds at its nominal rate.
    pub fn frame_count(&self) -> u64 {
        (self.duration_secs.max(0.0) * self.fps.as_f64()).round() as u64
    }

    /// Bytes in one packed RGB24 frame.
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// File name for display and metadata.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Check that the metadata describes something we can decode.
    pub fn validate(&self) -> UniqResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(UniqError::probe(format!(
                "{} has no video stream dimensions",
                self.path.display()
            )));
        }
        if self.fps.num == 0 {
            return Err(UniqError::probe(format!(
                "{} reports a zero frame rate",
                self.path.display()
            )));
        }
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(UniqError::probe(format!(
                "{} reports no duration",
                self.path.display()
            )));
        }
        Ok(())
    }
}
