//! Hand a finished run to the collaborators.

use std::path::PathBuf;

use uniquify_batch::{publish_run, Collaborators, PublishOptions, RunStore};
use uniquify_common::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    run: String,
    to: PathBuf,
    remote_root: String,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = RunStore::new(output_dir.unwrap_or_else(|| config.output_dir.clone()));
    let summary = store
        .run_info(&run)
        .map_err(|e| anyhow::anyhow!("Failed to load run {run}: {e}"))?;

    println!(
        "Publishing {} ({} successful version(s)) to {}",
        summary.run_name,
        summary.successful,
        to.display()
    );
    let report = publish_run(
        &summary,
        &Collaborators::local(&to),
        &remote_root,
        &PublishOptions::default(),
    )
    .await;

    for upload in &report.uploaded {
        println!("  [OK]   v{:03} -> {}", upload.version_id, upload.location);
    }
    for (id, reason) in &report.rejected {
        println!("  [SKIP] v{id:03} rejected: {reason}");
    }
    for (id, error) in &report.failed {
        println!("  [FAIL] v{id:03} {error}");
    }
    Ok(())
}
