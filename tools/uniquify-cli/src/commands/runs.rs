//! List runs or show one run.

use std::path::PathBuf;

use uniquify_batch::RunStore;
use uniquify_common::config::AppConfig;

pub fn run(
    config: &AppConfig,
    run: Option<String>,
    output_dir: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let store = RunStore::new(output_dir.unwrap_or_else(|| config.output_dir.clone()));

    if let Some(name) = run {
        let summary = store
            .run_info(&name)
            .map_err(|e| anyhow::anyhow!("Failed to load run {name}: {e}"))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        println!("Run: {}", summary.run_name);
        println!("  Input: {}", summary.input_video);
        println!("  Directory: {}", summary.run_dir);
        println!("  Generated: {}", summary.generated_at);
        println!(
            "  Versions: {} ({} ok, {} failed)",
            summary.total_versions, summary.successful, summary.failed
        );
        println!();
        for result in &summary.results {
            println!(
                "  v{:03} {:?} [{}] {}",
                result.version_id,
                result.status,
                result.effects.join(","),
                result
                    .output_file
                    .as_deref()
                    .or(result.error.as_deref())
                    .unwrap_or("")
            );
        }
        return Ok(());
    }

    let runs = store.list_runs()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No runs under {}", store.runs_root().display());
        return Ok(());
    }
    println!("Runs under {}:", store.runs_root().display());
    for summary in &runs {
        println!(
            "  {:<28} {:>3}/{:<3} ok  {}",
            summary.run_name, summary.successful, summary.total_versions, summary.generated_at
        );
    }
    Ok(())
}
