//! Generate a batch run.

use std::path::PathBuf;

use anyhow::Context;
use uniquify_batch::{BatchOrchestrator, Concurrency, GenerateRequest};
use uniquify_common::config::AppConfig;
use uniquify_model::parse_kinds;

pub struct GenerateArgs {
    pub input: PathBuf,
    pub versions: Option<usize>,
    pub run_name: Option<String>,
    pub combos: Vec<String>,
    pub sequential: bool,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let versions = args.versions.unwrap_or(config.batch.default_versions);
    let mut request = GenerateRequest::new(&args.input, versions)
        .with_max_workers(args.workers.unwrap_or(config.batch.max_workers))
        .with_concurrency(if args.sequential {
            Concurrency::Sequential
        } else {
            Concurrency::Parallel
        });
    if !args.combos.is_empty() {
        let palette = args
            .combos
            .iter()
            .map(|combo| parse_kinds(combo))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid --combo")?;
        request = request.with_palette(palette);
    }
    if let Some(name) = args.run_name {
        request = request.with_run_name(name);
    }
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }

    let mut config = config.clone();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    println!("Generating {versions} version(s) of {}", args.input.display());
    println!("  Workers: {}", request.worker_count());
    println!("  Output root: {}", config.output_dir.display());

    let orchestrator = BatchOrchestrator::from_config(&config)
        .with_cancel(super::cancel_on_ctrl_c())
        .with_progress(super::console_progress());
    let summary = orchestrator.generate_async(request).await?;

    eprintln!();
    println!("Run: {}", summary.run_name);
    println!("  Directory: {}", summary.run_dir);
    println!(
        "  Successful: {}/{} (failed: {})",
        summary.successful, summary.total_versions, summary.failed
    );
    println!("  Elapsed: {:.1}s", summary.elapsed_secs);
    for result in &summary.results {
        match &result.error {
            None => println!(
                "  [OK]   v{:03} {:<28} {} ({})",
                result.version_id,
                result.effects.join(","),
                result.output_file.as_deref().unwrap_or("-"),
                result.backend.as_deref().unwrap_or("-"),
            ),
            Some(error) => println!(
                "  [FAIL] v{:03} {:<28} {error}",
                result.version_id,
                result.effects.join(","),
            ),
        }
    }

    Ok(())
}
