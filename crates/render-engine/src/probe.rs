//! Container metadata via ffprobe.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{Asset, FrameRate};

use crate::ffmpeg::FFPROBE;

/// Reads container metadata into an [`Asset`].
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> UniqResult<Asset>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> UniqResult<Asset> {
        probe_asset(path)
    }
}

/// Probe `path` with ffprobe.
pub fn probe_asset(path: &Path) -> UniqResult<Asset> {
    if !path.exists() {
        return Err(UniqError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new(FFPROBE)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UniqError::tool_missing(FFPROBE)
            } else {
                UniqError::probe(format!("Failed to run ffprobe: {e}"))
            }
        })?;

    if !output.status.success() {
        return Err(UniqError::probe(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    let asset = parse_probe_output(path, &json)?;
    tracing::debug!(
        path = %path.display(),
        duration_secs = asset.duration_secs,
        fps = %asset.fps,
        width = asset.width,
        height = asset.height,
        has_audio = asset.has_audio,
        "Probed asset"
    );
    Ok(asset)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix side data or the
    /// legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .map(|degrees: f64| degrees.round() as i64)
            .unwrap_or(0)
    }

    /// Frame size after ffmpeg's autorotate, which is what the decoders emit.
    fn display_size(&self) -> (u32, u32) {
        let width = self.width.unwrap_or(0);
        let height = self.height.unwrap_or(0);
        match self.rotation().rem_euclid(360) {
            90 | 270 => (height, width),
            _ => (width, height),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Build an [`Asset`] from `ffprobe -print_format json` output.
pub fn parse_probe_output(path: &Path, json: &str) -> UniqResult<Asset> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| UniqError::probe(format!("Unreadable ffprobe output: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| UniqError::probe(format!("{} has no video stream", path.display())))?;
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let fps = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|rate| rate.parse::<FrameRate>().ok())
        .find(|rate| rate.num > 0)
        .ok_or_else(|| UniqError::probe(format!("{} has no frame rate", path.display())))?;

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| UniqError::probe(format!("{} has no duration", path.display())))?;

    let (width, height) = video.display_size();
    let asset = Asset {
        path: path.to_path_buf(),
        duration_secs,
        fps,
        width,
        height,
        codec: video.codec_name.clone().unwrap_or_default(),
        has_audio,
    };
    asset.validate()?;
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            { "codec_type": "video", "codec_name": "h264", "width": 640, "height": 360,
              "r_frame_rate": "30/1", "avg_frame_rate": "30/1", "duration": "10.000000" },
            { "codec_type": "audio", "codec_name": "aac" }
        ],
        "format": { "duration": "10.021333" }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let asset = parse_probe_output(Path::new("/in.mp4"), SAMPLE).unwrap();
        assert_eq!(asset.width, 640);
        assert_eq!(asset.height, 360);
        assert_eq!(asset.fps, FrameRate::integer(30));
        assert!((asset.duration_secs - 10.021333).abs() < 1e-9);
        assert!(asset.has_audio);
        assert_eq!(asset.codec, "h264");
    }

    #[test]
    fn test_avg_rate_falls_back_to_real_rate() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "codec_name": "h264", "width": 2, "height": 2,
                          "r_frame_rate": "25/1", "avg_frame_rate": "0/0", "duration": "4.0" }]
        }"#;
        let asset = parse_probe_output(Path::new("/in.mp4"), json).unwrap();
        assert_eq!(asset.fps, FrameRate::integer(25));
        assert_eq!(asset.duration_secs, 4.0);
        assert!(!asset.has_audio);
    }

    #[test]
    fn test_rotated_stream_reports_display_size() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                          "r_frame_rate": "30/1", "avg_frame_rate": "30/1",
                          "side_data_list": [{ "side_data_type": "Display Matrix", "rotation": -90 }] }],
            "format": { "duration": "12.5" }
        }"#;
        let asset = parse_probe_output(Path::new("/phone.mp4"), json).unwrap();
        assert_eq!((asset.width, asset.height), (1080, 1920));
    }

    #[test]
    fn test_rotate_tag_and_upside_down() {
        let tagged = r#"{
            "streams": [{ "codec_type": "video", "width": 1280, "height": 720,
                          "avg_frame_rate": "25/1", "tags": { "rotate": "270", "language": "und" } }],
            "format": { "duration": "3" }
        }"#;
        let asset = parse_probe_output(Path::new("/old.mov"), tagged).unwrap();
        assert_eq!((asset.width, asset.height), (720, 1280));

        let flipped = r#"{
            "streams": [{ "codec_type": "video", "width": 1280, "height": 720,
                          "avg_frame_rate": "25/1", "side_data_list": [{ "rotation": 180 }] }],
            "format": { "duration": "3" }
        }"#;
        let asset = parse_probe_output(Path::new("/flip.mp4"), flipped).unwrap();
        assert_eq!((asset.width, asset.height), (1280, 720));
    }

    #[test]
    fn test_audio_only_is_probe_error() {
        let json = r#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "3" } }"#;
        assert!(matches!(
            parse_probe_output(Path::new("/a.m4a"), json),
            Err(UniqError::Probe { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(
            probe_asset(Path::new("/definitely/missing/clip.mp4")),
            Err(UniqError::FileNotFound { .. })
        ));
    }
}
