//! Per-frame operations built from effect stages.

use image::RgbImage;
use uniquify_common::{UniqError, UniqResult};
use uniquify_model::{EffectStage, NeuralParams, SocialParams, StageParams, VisualParams};

use crate::neural::{apply_neural, ExecDevice};
use crate::social::apply_social;
use crate::visual::apply_visual;

/// Wrap a packed RGB24 buffer, rejecting short or oversized frames.
pub fn frame_from_bytes(
    stage: &str,
    width: u32,
    height: u32,
    bytes: Vec<u8>,
) -> UniqResult<RgbImage> {
    let expected = width as usize * height as usize * 3;
    if bytes.len() != expected {
        return Err(UniqError::stage(
            stage,
            format!(
                "corrupt frame: got {} bytes, expected {expected} for {width}x{height}",
                bytes.len()
            ),
        ));
    }
    RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| UniqError::stage(stage, "frame buffer does not match dimensions"))
}

/// The per-frame half of a stage. Temporal stages have none: they only change
/// which source frame is shown.
#[derive(Debug, Clone, Copy)]
pub enum FrameOp {
    Visual { params: VisualParams, seed: u64 },
    Social { params: SocialParams, seed: u64 },
    Neural {
        params: NeuralParams,
        seed: u64,
        device: ExecDevice,
    },
}

impl FrameOp {
    pub fn for_stage(stage: &EffectStage, device: ExecDevice) -> Option<Self> {
        match stage.params {
            StageParams::Temporal(_) => None,
            StageParams::Visual(params) => Some(FrameOp::Visual {
                params,
                seed: stage.seed,
            }),
            StageParams::Social(params) => Some(FrameOp::Social {
                params,
                seed: stage.seed,
            }),
            StageParams::Neural(params) => Some(FrameOp::Neural {
                params,
                seed: stage.seed,
                device,
            }),
        }
    }

    /// Transform output frame `frame_index` in place.
    pub fn apply(&self, frame: &mut RgbImage, frame_index: u64) {
        match self {
            FrameOp::Visual { params, seed } => apply_visual(frame, params, *seed, frame_index),
            FrameOp::Social { params, seed } => apply_social(frame, params, *seed, frame_index),
            FrameOp::Neural {
                params,
                seed,
                device,
            } => apply_neural(frame, params, *seed, frame_index, *device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniquify_model::EffectKind;

    #[test]
    fn test_short_frame_is_stage_error() {
        let err = frame_from_bytes("visual", 4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, UniqError::Stage { ref stage, .. } if stage == "visual"));
        assert!(frame_from_bytes("visual", 4, 4, vec![0; 48]).is_ok());
    }

    #[test]
    fn test_temporal_has_no_frame_op() {
        let stage = EffectStage::sample(EffectKind::Temporal, 1);
        assert!(FrameOp::for_stage(&stage, ExecDevice::Cpu).is_none());
        for kind in [EffectKind::Visual, EffectKind::Social, EffectKind::Neural] {
            let stage = EffectStage::sample(kind, 1);
            assert!(FrameOp::for_stage(&stage, ExecDevice::Cpu).is_some());
        }
    }
}
