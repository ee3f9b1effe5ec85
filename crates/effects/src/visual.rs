//! Visual stage: brightness, contrast, saturation and faint luma noise.

use image::RgbImage;
use uniquify_model::VisualParams;

use crate::color::{add_brightness, saturate, scale_offset, to_u8};
use crate::noise::{frame_rng, GaussianNoise};

/// Apply the visual stage to one frame.
///
/// The colour parameters are the same on every frame; the noise pattern is
/// drawn from `(stage_seed, frame_index)`.
pub fn apply_visual(frame: &mut RgbImage, params: &VisualParams, stage_seed: u64, frame_index: u64) {
    add_brightness(frame, params.brightness);
    if (params.contrast - 1.0).abs() > f64::EPSILON {
        scale_offset(frame, params.contrast, 0.0);
    }
    saturate(frame, params.saturation);

    if params.noise_sigma > 0.0 {
        let mut noise = GaussianNoise::new(frame_rng(stage_seed, frame_index), params.noise_sigma);
        for pixel in frame.pixels_mut() {
            let n = noise.sample();
            for channel in pixel.0.iter_mut() {
                *channel = to_u8(*channel as f64 + n);
            }
        }
    }
}
