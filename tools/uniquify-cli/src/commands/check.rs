//! Check system capabilities.

use uniquify_common::config::{config_file_path, AppConfig};
use uniquify_effects::ExecDevice;
use uniquify_render_engine::ffmpeg::{command_exists, FFMPEG, FFPROBE};
use uniquify_render_engine::{BackendSettings, FallbackCoordinator};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Uniquify System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for tool in [FFMPEG, FFPROBE] {
        if command_exists(tool) {
            println!("[OK] {tool} found on PATH");
        } else {
            println!("[MISSING] {tool} not found on PATH");
            all_ok = false;
        }
    }

    let device = ExecDevice::resolve(config.device);
    println!(
        "[OK] Compute device: {} (configured: {:?})",
        device.name(),
        config.device
    );

    let coordinator = FallbackCoordinator::standard(BackendSettings::from_config(config));
    println!("[OK] Backends (in order): {}", coordinator.backend_names().join(", "));
    println!(
        "[OK] Chunking: {} (max {}s)",
        if config.chunking.enabled { "on" } else { "off" },
        config.chunking.max_chunk_duration_secs
    );
    println!("     Config file: {}", config_file_path().display());
    println!("     Output root: {}", config.output_dir.display());

    println!();
    if all_ok {
        println!("All required tools are available. Uniquify is ready.");
    } else {
        println!("Install ffmpeg (which ships ffprobe) and make sure it is on PATH.");
    }
    Ok(())
}
