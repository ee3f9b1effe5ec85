//! Process a single video.

use std::path::PathBuf;

use anyhow::Context;
use uniquify_common::config::AppConfig;
use uniquify_model::{parse_kinds, PipelineSpec, Preset};
use uniquify_render_engine::VideoProcessor;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    input: PathBuf,
    output: PathBuf,
    effects: String,
    preset: Option<String>,
    seed: Option<u64>,
    no_chunking: bool,
    chunk_secs: Option<f64>,
) -> anyhow::Result<()> {
    let seed = seed.unwrap_or_else(rand::random);
    let spec = match preset {
        Some(id) => Preset::find(&id)
            .ok_or_else(|| anyhow::anyhow!("Unknown preset: {id}. See `uniquify presets`"))?
            .build_spec(seed),
        None => PipelineSpec::build(&parse_kinds(&effects).context("Invalid --effects")?, seed),
    };

    let mut config = config.clone();
    if no_chunking {
        config.chunking.enabled = false;
    }
    if let Some(secs) = chunk_secs {
        config.chunking.max_chunk_duration_secs = secs;
    }
    config.validate()?;

    println!("Processing: {}", input.display());
    println!("  Output: {}", output.display());
    println!("  Stages: {}", spec.effect_names().join(" -> "));
    println!("  Seed: {seed}");

    let processor = VideoProcessor::from_config(&config);
    let options = processor
        .options()
        .clone()
        .with_cancel(super::cancel_on_ctrl_c())
        .with_progress(super::console_progress());
    let processor = processor.with_options(options);

    let report = tokio::task::spawn_blocking(move || processor.process(&input, &output, &spec))
        .await
        .context("Processing task failed")??;

    eprintln!();
    println!("Done: {}", report.output.display());
    println!("  Backend: {}", report.backend);
    println!("  Chunks: {}", report.chunks);
    println!("  Duration: {:.2}s", report.duration_secs);
    println!(
        "  Size: {:.2} MB",
        report.file_size_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("  Elapsed: {:.1}s", report.elapsed_secs);
    Ok(())
}
