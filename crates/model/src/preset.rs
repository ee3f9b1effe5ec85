//! Named filter presets: a fixed social style at a fixed playback speed.

use serde::Serialize;

use crate::pipeline::PipelineSpec;
use crate::stage::{
    derive_seed, EffectStage, SocialParams, SocialStyle, StageParams, TemporalParams,
};

/// Playback speed of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetSpeed {
    Slow,
    Normal,
    Fast,
}

impl PresetSpeed {
    pub const ALL: [PresetSpeed; 3] = [PresetSpeed::Slow, PresetSpeed::Normal, PresetSpeed::Fast];

    pub fn factor(&self) -> f64 {
        match self {
            PresetSpeed::Slow => 0.8,
            PresetSpeed::Normal => 1.0,
            PresetSpeed::Fast => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetSpeed::Slow => "slow",
            PresetSpeed::Normal => "normal",
            PresetSpeed::Fast => "fast",
        }
    }
}

/// A `<style>_<speed>` preset such as `vintage_slow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Preset {
    pub style: SocialStyle,
    pub speed: PresetSpeed,
}

impl Preset {
    /// All twelve presets, grouped by style.
    pub fn all() -> Vec<Preset> {
        SocialStyle::ALL
            .into_iter()
            .flat_map(|style| {
                PresetSpeed::ALL
                    .into_iter()
                    .map(move |speed| Preset { style, speed })
            })
            .collect()
    }

    /// Look up a preset by id (case-insensitive).
    pub fn find(id: &str) -> Option<Preset> {
        Self::all()
            .into_iter()
            .find(|preset| preset.id().eq_ignore_ascii_case(id.trim()))
    }

    pub fn id(&self) -> String {
        format!("{}_{}", self.style, self.speed.as_str())
    }

    /// Social stage first, then (unless normal speed) an untrimmed temporal
    /// stage at the preset speed.
    pub fn build_spec(&self, seed: u64) -> PipelineSpec {
        let mut stages = vec![EffectStage::with_params(
            StageParams::Social(SocialParams::for_style(self.style)),
            derive_seed(seed, 0),
        )];
        if self.speed != PresetSpeed::Normal {
            stages.push(EffectStage::with_params(
                StageParams::Temporal(TemporalParams {
                    speed: self.speed.factor(),
                    trim_start_frac: 0.0,
                    trim_end_frac: 0.0,
                }),
                derive_seed(seed, 1),
            ));
        }
        PipelineSpec::from_stages(stages, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::EffectKind;

    #[test]
    fn test_twelve_unique_presets() {
        let all = Preset::all();
        assert_eq!(all.len(), 12);
        let mut ids: Vec<String> = all.iter().map(Preset::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_find_by_id() {
        let preset = Preset::find("Dramatic_Fast").unwrap();
        assert_eq!(preset.style, SocialStyle::Dramatic);
        assert_eq!(preset.speed, PresetSpeed::Fast);
        assert!(Preset::find("sepia_slow").is_none());
    }

    #[test]
    fn test_normal_preset_has_only_social_stage() {
        let spec = Preset::find("soft_normal").unwrap().build_spec(1);
        assert_eq!(spec.kinds(), vec![EffectKind::Social]);
    }

    #[test]
    fn test_slow_preset_adds_untrimmed_temporal() {
        let spec = Preset::find("vibrant_slow").unwrap().build_spec(1);
        assert_eq!(spec.kinds(), vec![EffectKind::Social, EffectKind::Temporal]);
        match spec.stages()[1].params {
            StageParams::Temporal(p) => {
                assert_eq!(p.speed, 0.8);
                assert_eq!(p.trim_start_frac, 0.0);
                assert_eq!(p.trim_end_frac, 0.0);
            }
            other => panic!("expected temporal params, got {other:?}"),
        }
    }
}
