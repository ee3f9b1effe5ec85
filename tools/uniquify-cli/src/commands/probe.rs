//! Show media information.

use std::path::PathBuf;

use uniquify_render_engine::probe_asset;

pub fn run(input: PathBuf, json: bool) -> anyhow::Result<()> {
    let asset = probe_asset(&input)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&asset)?);
        return Ok(());
    }

    println!("File: {}", asset.path.display());
    println!("  Duration: {:.3}s", asset.duration_secs);
    println!(
        "  Video: {} {}x{} @ {} ({:.3} fps, {} frames)",
        asset.codec,
        asset.width,
        asset.height,
        asset.fps,
        asset.fps.as_f64(),
        asset.frame_count()
    );
    println!("  Audio: {}", if asset.has_audio { "yes" } else { "no" });
    Ok(())
}
