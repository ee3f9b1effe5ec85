//! Execution backend trait and the ffmpeg filter strings both backends share.

use std::path::Path;

use uniquify_common::{AppConfig, UniqResult};
use uniquify_effects::{ExecDevice, TimeMap};
use uniquify_model::{Asset, EffectStage};

use crate::ffmpeg::EncodeSettings;
use crate::progress::ProgressSink;

/// Something that can render one effect stage from an input file to an
/// output file.
pub trait ExecutionBackend: Send + Sync {
    /// Backend name, recorded in version metadata.
    fn name(&self) -> &str;

    /// Check if this backend can run on this system.
    fn is_available(&self) -> bool;

    /// Render `stage` applied to `input` into `output`.
    fn apply_stage(
        &self,
        stage: &EffectStage,
        input: &Asset,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> UniqResult<()>;
}

/// Settings shared by the built-in backends.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub encode: EncodeSettings,
    pub device: ExecDevice,
}

impl BackendSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            encode: EncodeSettings::from(&config.encoding),
            device: ExecDevice::resolve(config.device),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// `atempo` factors whose product is `speed`, each within ffmpeg's
/// accepted `[0.5, 2.0]`.
pub fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut remaining = if speed > 0.0 { speed } else { 1.0 };
    let mut factors = Vec::new();
    while remaining > 2.0 {
        factors.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        factors.push(0.5);
        remaining /= 0.5;
    }
    factors.push(remaining);
    factors
}

/// Audio chain matching a time map: trim, reset timestamps, change tempo.
pub fn audio_retime_filter(map: &TimeMap) -> String {
    let (start, end) = map.trim_window();
    let mut filter = format!("atrim=start={start:.6}:end={end:.6},asetpts=PTS-STARTPTS");
    for factor in atempo_chain(map.speed()) {
        filter.push_str(&format!(",atempo={factor:.6}"));
    }
    filter
}

/// Video chain matching a time map: trim, reset timestamps, rescale time.
pub fn video_retime_filter(map: &TimeMap) -> String {
    let (start, end) = map.trim_window();
    format!(
        "trim=start={start:.6}:end={end:.6},setpts=(PTS-STARTPTS)/{:.6}",
        map.speed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uniquify_model::TemporalParams;

    #[test]
    fn test_atempo_chain_stays_in_range() {
        assert_eq!(atempo_chain(1.05), vec![1.05]);
        let chain = atempo_chain(5.0);
        assert!(chain.iter().all(|f| (0.5..=2.0).contains(f)));
        assert!((chain.iter().product::<f64>() - 5.0).abs() < 1e-9);
        let chain = atempo_chain(0.2);
        assert!(chain.iter().all(|f| (0.5..=2.0).contains(f)));
        assert!((chain.iter().product::<f64>() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_retime_filters() {
        let map = TimeMap::new(
            10.0,
            30.0,
            &TemporalParams {
                speed: 1.25,
                trim_start_frac: 0.01,
                trim_end_frac: 0.02,
            },
        );
        let audio = audio_retime_filter(&map);
        assert!(audio.starts_with("atrim=start=0.100000:end=9.800000"));
        assert!(audio.ends_with("atempo=1.250000"));
        let video = video_retime_filter(&map);
        assert_eq!(
            video,
            "trim=start=0.100000:end=9.800000,setpts=(PTS-STARTPTS)/1.250000"
        );
    }

    proptest! {
        #[test]
        fn prop_atempo_product_matches_speed(speed in 0.05f64..20.0) {
            let chain = atempo_chain(speed);
            prop_assert!(chain.iter().all(|f| (0.5..=2.0).contains(f)));
            let product: f64 = chain.iter().product();
            prop_assert!((product - speed).abs() < 1e-9 * speed.max(1.0));
        }
    }
}
