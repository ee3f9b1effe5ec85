//! Ordered effect pipelines.

use serde::{Deserialize, Serialize};

use crate::stage::{derive_seed, EffectKind, EffectStage};

/// An ordered list of stages. The order is fixed when the spec is created and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    seed: u64,
    stages: Vec<EffectStage>,
}

impl PipelineSpec {
    /// Build a spec for `kinds`, sampling stage `i` from `derive_seed(seed, i)`.
    pub fn build(kinds: &[EffectKind], seed: u64) -> Self {
        let stages = kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| EffectStage::sample(*kind, derive_seed(seed, index as u64)))
            .collect();
        Self { seed, stages }
    }

    /// Wrap stages that were built elsewhere (presets, tests).
    pub fn from_stages(stages: Vec<EffectStage>, seed: u64) -> Self {
        Self { seed, stages }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stages(&self) -> &[EffectStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn kinds(&self) -> Vec<EffectKind> {
        self.stages.iter().map(|stage| stage.kind).collect()
    }

    /// Effect names in order, as written to `metadata.json`.
    pub fn effect_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| stage.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_keeps_order() {
        let kinds = [EffectKind::Social, EffectKind::Temporal, EffectKind::Visual];
        let spec = PipelineSpec::build(&kinds, 9);
        assert_eq!(spec.kinds(), kinds.to_vec());
        assert_eq!(spec.effect_names(), vec!["social", "temporal", "visual"]);
        assert_eq!(spec.seed(), 9);
    }

    #[test]
    fn test_build_is_deterministic() {
        let kinds = [EffectKind::Temporal, EffectKind::Visual];
        assert_eq!(
            PipelineSpec::build(&kinds, 123),
            PipelineSpec::build(&kinds, 123)
        );
        assert_ne!(
            PipelineSpec::build(&kinds, 123),
            PipelineSpec::build(&kinds, 124)
        );
    }

    #[test]
    fn test_repeated_kinds_get_distinct_seeds() {
        let spec = PipelineSpec::build(&[EffectKind::Visual, EffectKind::Visual], 5);
        assert_ne!(spec.stages()[0].seed, spec.stages()[1].seed);
    }

    #[test]
    fn test_empty_spec() {
        let spec = PipelineSpec::build(&[], 1);
        assert!(spec.is_empty());
        assert_eq!(spec.len(), 0);
    }
}
