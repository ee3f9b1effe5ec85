//! Size-reducing re-encode for very large inputs, run before splitting.

use std::path::{Path, PathBuf};

use uniquify_common::{CompressionConfig, UniqError, UniqResult};
use uniquify_model::Asset;

use crate::ffmpeg::{run_ffmpeg, EncodeSettings};
use crate::probe::MediaProbe;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// File size in megabytes.
pub fn file_size_mb(path: &Path) -> UniqResult<f64> {
    Ok(std::fs::metadata(path)?.len() as f64 / BYTES_PER_MB)
}

/// Whether `size_mb` exceeds the configured limit.
pub fn needs_compression(size_mb: f64, config: &CompressionConfig) -> bool {
    config.enabled && size_mb > config.max_size_mb
}

/// Re-encode `asset` into `workspace` when it is over the size limit.
/// Returns the asset to continue with: the compressed copy, or the input
/// unchanged.
pub fn compress_if_needed(
    asset: &Asset,
    config: &CompressionConfig,
    workspace: &Path,
    probe: &dyn MediaProbe,
) -> UniqResult<Asset> {
    let size_mb = file_size_mb(&asset.path)?;
    if !needs_compression(size_mb, config) {
        return Ok(asset.clone());
    }

    let output = compressed_path(asset, workspace);
    tracing::info!(
        input = %asset.path.display(),
        size_mb,
        limit_mb = config.max_size_mb,
        "Compressing oversized input"
    );
    let args = compression_args(asset, config, &output);
    run_ffmpeg(&args, asset.duration_secs, |_| {})
        .map_err(|e| UniqError::pipeline(format!("compression failed: {e}")))?;

    let compressed = probe.probe(&output)?;
    tracing::info!(
        output = %output.display(),
        size_mb = file_size_mb(&output).unwrap_or(0.0),
        height = compressed.height,
        "Input compressed"
    );
    Ok(compressed)
}

fn compressed_path(asset: &Asset, workspace: &Path) -> PathBuf {
    let stem = asset
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    workspace.join(format!("{stem}_compressed.mp4"))
}

fn compression_args(asset: &Asset, config: &CompressionConfig, output: &Path) -> Vec<String> {
    let encode = EncodeSettings {
        crf: config.crf,
        preset: config.preset.clone(),
        audio_bitrate_kbps: config.audio_bitrate_kbps,
    };
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        asset.path.display().to_string(),
        "-vf".to_string(),
        // -2 keeps the width even; the height is rounded down to even.
        format!(
            "scale=-2:'trunc(min({},ih)/2)*2'",
            config.max_height.max(2)
        ),
    ];
    args.extend(encode.video_args());
    if asset.has_audio {
        args.extend(encode.audio_args());
    }
    args.extend(EncodeSettings::container_args());
    args.push(output.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniquify_model::FrameRate;

    fn asset(has_audio: bool) -> Asset {
        Asset {
            path: PathBuf::from("/media/huge.mov"),
            duration_secs: 600.0,
            fps: FrameRate::integer(30),
            width: 3840,
            height: 2160,
            codec: "hevc".to_string(),
            has_audio,
        }
    }

    #[test]
    fn test_threshold() {
        let config = CompressionConfig {
            enabled: true,
            max_size_mb: 100.0,
            ..CompressionConfig::default()
        };
        assert!(!needs_compression(100.0, &config));
        assert!(needs_compression(100.5, &config));

        let disabled = CompressionConfig {
            enabled: false,
            ..config
        };
        assert!(!needs_compression(10_000.0, &disabled));
    }

    #[test]
    fn test_compression_args() {
        let config = CompressionConfig::default();
        let output = Path::new("/work/huge_compressed.mp4");
        let joined = compression_args(&asset(true), &config, output).join(" ");
        assert!(joined.contains("scale=-2:'trunc(min(720,ih)/2)*2'"));
        assert!(joined.contains("-crf 30"));
        assert!(joined.contains("-preset fast"));
        assert!(joined.contains("-b:a 96k"));
        assert!(joined.ends_with("/work/huge_compressed.mp4"));

        let silent = compression_args(&asset(false), &config, output).join(" ");
        assert!(!silent.contains("-c:a"));
    }

    #[test]
    fn test_compressed_path_uses_stem() {
        assert_eq!(
            compressed_path(&asset(true), Path::new("/work")),
            PathBuf::from("/work/huge_compressed.mp4")
        );
    }

    #[test]
    fn test_small_file_passes_through() {
        struct NoProbe;
        impl MediaProbe for NoProbe {
            fn probe(&self, _: &Path) -> UniqResult<Asset> {
                Err(UniqError::probe("should not be called"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.mp4");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        let mut small = asset(true);
        small.path = path;

        let result =
            compress_if_needed(&small, &CompressionConfig::default(), dir.path(), &NoProbe).unwrap();
        assert_eq!(result, small);
    }
}
