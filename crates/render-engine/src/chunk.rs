//! Splitting oversized inputs into bounded segments and merging processed
//! segments back into one file. Both directions use stream copy.

use std::path::{Path, PathBuf};

use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{is_contiguous, plan_chunks, Asset, Chunk, ChunkSpan};

use crate::ffmpeg::{run_ffmpeg, EncodeSettings};
use crate::pipeline::remove_quietly;

pub const MANIFEST_FILE: &str = "concat_list.txt";

/// Cuts segments out of a source and joins processed segments back into one
/// file.
pub trait ChunkTool: Send + Sync {
    /// Write the `span` of `source` to `output`.
    fn extract(&self, source: &Path, span: &ChunkSpan, output: &Path) -> UniqResult<()>;

    /// Concatenate `chunks`, in order, into `output`.
    fn concat(&self, chunks: &[Chunk], output: &Path) -> UniqResult<()>;
}

/// [`ChunkTool`] using ffmpeg stream copy in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegChunkTool;

impl ChunkTool for FfmpegChunkTool {
    fn extract(&self, source: &Path, span: &ChunkSpan, output: &Path) -> UniqResult<()> {
        extract_segment(source, span, output)
    }

    fn concat(&self, chunks: &[Chunk], output: &Path) -> UniqResult<()> {
        concat_with_ffmpeg(chunks, output)
    }
}

/// Cuts an asset into chunks no longer than `max_chunk_secs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSplitter {
    pub max_chunk_secs: f64,
}

impl ChunkSplitter {
    pub fn new(max_chunk_secs: f64) -> Self {
        Self { max_chunk_secs }
    }

    /// Split `asset` into `dir` with ffmpeg stream copy.
    pub fn split(&self, asset: &Asset, dir: &Path) -> UniqResult<Vec<Chunk>> {
        self.split_with(asset, dir, |span, output| {
            FfmpegChunkTool.extract(&asset.path, span, output)
        })
    }

    /// Split using a custom segment extractor.
    ///
    /// An asset within the limit comes back as its own identity chunk. A
    /// failed extraction is logged and skipped; if nothing could be
    /// extracted the identity chunk is returned instead. Surviving chunks are
    /// numbered by position so the list stays contiguous.
    pub fn split_with(
        &self,
        asset: &Asset,
        dir: &Path,
        mut extract: impl FnMut(&ChunkSpan, &Path) -> UniqResult<()>,
    ) -> UniqResult<Vec<Chunk>> {
        let spans = plan_chunks(asset.duration_secs, self.max_chunk_secs);
        if spans.len() <= 1 {
            tracing::debug!(
                duration_secs = asset.duration_secs,
                max_chunk_secs = self.max_chunk_secs,
                "Input within chunk limit, no split"
            );
            return Ok(vec![Chunk::identity(&asset.path, asset.duration_secs)]);
        }

        std::fs::create_dir_all(dir)?;
        tracing::info!(
            path = %asset.path.display(),
            duration_secs = asset.duration_secs,
            chunks = spans.len(),
            "Splitting input"
        );

        let mut chunks = Vec::with_capacity(spans.len());
        for span in &spans {
            let output = dir.join(format!("chunk_{:03}.mp4", span.index));
            match extract(span, &output) {
                Ok(()) => {
                    let position = chunks.len();
                    let mut chunk = Chunk::extracted(*span, &output);
                    chunk.index = position;
                    chunks.push(chunk);
                }
                Err(e) => {
                    tracing::warn!(
                        chunk = span.index,
                        start_secs = span.start_secs,
                        error = %e,
                        "Chunk extraction failed, skipping"
                    );
                    remove_quietly(&output);
                }
            }
        }

        if chunks.is_empty() {
            tracing::warn!(
                path = %asset.path.display(),
                "No chunks extracted, processing input whole"
            );
            return Ok(vec![Chunk::identity(&asset.path, asset.duration_secs)]);
        }
        Ok(chunks)
    }
}

fn extract_segment(input: &Path, span: &ChunkSpan, output: &Path) -> UniqResult<()> {
    let args = vec![
        "-y".to_string(),
        "-ss".to_string(),
        format!("{:.6}", span.start_secs),
        "-i".to_string(),
        input.display().to_string(),
        "-t".to_string(),
        format!("{:.6}", span.duration_secs),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        output.display().to_string(),
    ];
    run_ffmpeg(&args, span.duration_secs, |_| {})
        .map_err(|e| UniqError::chunk_extraction(span.index, e.to_string()))?;
    if !output.exists() {
        return Err(UniqError::chunk_extraction(
            span.index,
            "ffmpeg produced no output",
        ));
    }
    Ok(())
}

/// Concatenate processed chunks into `output` with ffmpeg.
pub fn merge_chunks(chunks: &[Chunk], output: &Path) -> UniqResult<PathBuf> {
    merge_with(chunks, output, concat_with_ffmpeg)
}

/// Concatenate processed chunks into `output` using `concat`.
///
/// The list must be non-empty and contiguous. A single chunk is moved (or
/// copied, if it is the original input) into place without calling
/// `concat`. Any failure is a merge error and leaves no output behind; owned
/// chunk files are deleted only after a successful merge.
pub fn merge_with(
    chunks: &[Chunk],
    output: &Path,
    concat: impl FnOnce(&[Chunk], &Path) -> UniqResult<()>,
) -> UniqResult<PathBuf> {
    if chunks.is_empty() {
        return Err(UniqError::merge("no chunks to merge"));
    }
    if !is_contiguous(chunks) {
        return Err(UniqError::merge("chunks are not contiguous"));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if let [single] = chunks {
        place_single(single, output)?;
        return Ok(output.to_path_buf());
    }

    if let Err(e) = concat(chunks, output) {
        remove_quietly(output);
        return Err(match e {
            UniqError::Merge { .. } => e,
            other => UniqError::merge(other.to_string()),
        });
    }

    for chunk in chunks.iter().filter(|c| c.owned) {
        remove_quietly(&chunk.path);
    }
    tracing::info!(
        output = %output.display(),
        chunks = chunks.len(),
        "Chunks merged"
    );
    Ok(output.to_path_buf())
}

fn concat_with_ffmpeg(chunks: &[Chunk], output: &Path) -> UniqResult<()> {
    let manifest = output.with_file_name(format!(
        "{}_{MANIFEST_FILE}",
        output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merge".to_string())
    ));
    std::fs::write(&manifest, concat_manifest(chunks)?)?;

    let expected: f64 = chunks.iter().map(|c| c.duration_secs).sum();
    let mut args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
    ];
    args.extend(EncodeSettings::container_args());
    args.push(output.display().to_string());

    let result = run_ffmpeg(&args, expected, |_| {});
    remove_quietly(&manifest);
    result.map_err(|e| UniqError::merge(e.to_string()))
}

fn place_single(chunk: &Chunk, output: &Path) -> UniqResult<()> {
    if chunk.path == output {
        return Ok(());
    }
    if chunk.owned && std::fs::rename(&chunk.path, output).is_ok() {
        return Ok(());
    }
    std::fs::copy(&chunk.path, output).map_err(|e| {
        UniqError::merge(format!(
            "failed to place {} at {}: {e}",
            chunk.path.display(),
            output.display()
        ))
    })?;
    if chunk.owned {
        remove_quietly(&chunk.path);
    }
    Ok(())
}

/// Concat demuxer manifest, one `file '<path>'` line per chunk.
///
/// The demuxer resolves relative entries against the manifest's directory,
/// so every path is written absolute.
pub fn concat_manifest(chunks: &[Chunk]) -> UniqResult<String> {
    let cwd = std::env::current_dir()?;
    Ok(chunks
        .iter()
        .map(|chunk| {
            let path = cwd.join(&chunk.path);
            let path = path.display().to_string().replace('\'', r"'\''");
            format!("file '{path}'\n")
        })
        .collect())
}
