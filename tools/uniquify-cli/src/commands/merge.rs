//! Merge chunk files into one video.

use std::path::PathBuf;

use uniquify_model::Chunk;
use uniquify_render_engine::{ensure_tools, merge_chunks, probe_asset};

pub fn run(output: PathBuf, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    ensure_tools()?;

    // User-supplied chunks are never deleted.
    let mut chunks = Vec::with_capacity(paths.len());
    let mut start_secs = 0.0;
    for (index, path) in paths.into_iter().enumerate() {
        let asset = probe_asset(&path)?;
        chunks.push(Chunk {
            index,
            start_secs,
            duration_secs: asset.duration_secs,
            path,
            owned: false,
        });
        start_secs += asset.duration_secs;
    }

    println!("Merging {} chunk(s) ({start_secs:.2}s)", chunks.len());
    merge_chunks(&chunks, &output)?;
    let merged = probe_asset(&output)?;
    println!(
        "Merged: {} ({:.2}s)",
        output.display(),
        merged.duration_secs
    );
    Ok(())
}
