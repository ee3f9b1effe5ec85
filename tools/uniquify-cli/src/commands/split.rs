//! Split a video into chunks.

use std::path::PathBuf;

use uniquify_common::config::AppConfig;
use uniquify_render_engine::{ensure_tools, probe_asset, ChunkSplitter};

pub fn run(
    config: &AppConfig,
    input: PathBuf,
    output: PathBuf,
    max_secs: Option<f64>,
) -> anyhow::Result<()> {
    ensure_tools()?;
    let max_secs = max_secs.unwrap_or(config.chunking.max_chunk_duration_secs);
    let asset = probe_asset(&input)?;
    println!(
        "Splitting {} ({:.2}s) into chunks of at most {max_secs}s",
        input.display(),
        asset.duration_secs
    );

    let chunks = ChunkSplitter::new(max_secs).split(&asset, &output)?;
    if chunks.len() == 1 && !chunks[0].owned {
        println!("  No split needed: input is within the chunk limit");
        return Ok(());
    }
    for chunk in &chunks {
        println!(
            "  [{:03}] {:>8.2}s +{:>6.2}s  {}",
            chunk.index,
            chunk.start_secs,
            chunk.duration_secs,
            chunk.path.display()
        );
    }
    println!("Wrote {} chunk(s) to {}", chunks.len(), output.display());
    Ok(())
}
