//! List filter presets.

use uniquify_model::Preset;

pub fn run() -> anyhow::Result<()> {
    println!("Filter presets:");
    for preset in Preset::all() {
        let spec = preset.build_spec(0);
        println!(
            "  {:<18} {:<8} x{:.1}  ({})",
            preset.id(),
            preset.style.as_str(),
            preset.speed.factor(),
            spec.effect_names().join(" -> ")
        );
    }
    Ok(())
}
