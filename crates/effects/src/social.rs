//! Social stage looks.

use image::{imageops, RgbImage};
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use uniquify_model::SocialParams;

use crate::color::{add_brightness, saturate, scale_offset, to_u8};
use crate::noise::{frame_rng, GaussianNoise};

/// Grain standard deviation per unit of the `grain` parameter.
const GRAIN_SCALE: f64 = 25.0;
/// Edge blend weight per unit of clarity above 1.
const CLARITY_WEIGHT: f64 = 0.3;

/// Apply a social look to one frame.
pub fn apply_social(frame: &mut RgbImage, params: &SocialParams, stage_seed: u64, frame_index: u64) {
    match *params {
        SocialParams::Vintage {
            warmth,
            vignette,
            grain,
        } => vintage(frame, warmth, vignette, grain, stage_seed, frame_index),
        SocialParams::Dramatic {
            contrast,
            shadows,
            highlights,
        } => dramatic(frame, contrast, shadows, highlights),
        SocialParams::Soft {
            blur,
            brightness,
            saturation,
        } => soft(frame, blur, brightness, saturation),
        SocialParams::Vibrant {
            saturation,
            vibrance,
            clarity,
        } => vibrant(frame, saturation, vibrance, clarity),
    }
}

fn vintage(
    frame: &mut RgbImage,
    warmth: f64,
    vignette: f64,
    grain: f64,
    stage_seed: u64,
    frame_index: u64,
) {
    let (width, height) = frame.dimensions();
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    let max_radius = [
        (0.0, 0.0),
        (width.saturating_sub(1) as f64, 0.0),
        (0.0, height.saturating_sub(1) as f64),
        (width.saturating_sub(1) as f64, height.saturating_sub(1) as f64),
    ]
    .iter()
    .map(|(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
    .fold(0.0_f64, f64::max);

    let mut noise = GaussianNoise::new(frame_rng(stage_seed, frame_index), grain * GRAIN_SCALE);
    let with_grain = grain > 0.0;

    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        let [r, g, b] = pixel.0;
        let r = (r as f64 * warmth).clamp(0.0, 255.0);
        let b = (b as f64 * (2.0 - warmth)).clamp(0.0, 255.0);
        let g = g as f64;

        let mask = if max_radius > 0.0 {
            let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
            1.0 - (d / max_radius) * vignette
        } else {
            1.0
        };

        let mut channels = [r * mask, g * mask, b * mask];
        if with_grain {
            for c in channels.iter_mut() {
                *c += noise.sample();
            }
        }
        pixel.0 = channels.map(to_u8);
    }
}

fn dramatic(frame: &mut RgbImage, contrast: f64, shadows: f64, highlights: f64) {
    for value in frame.iter_mut() {
        let v = (*value as f64 * contrast).round().clamp(0.0, 255.0);
        let v = (v * highlights).clamp(0.0, 255.0);
        *value = to_u8(v * shadows);
    }
}

fn soft(frame: &mut RgbImage, blur: f64, brightness: i32, saturation: f64) {
    if blur > 0.0 {
        *frame = gaussian_blur_f32(&*frame, blur as f32);
    }
    add_brightness(frame, brightness);
    saturate(frame, saturation);
}

fn vibrant(frame: &mut RgbImage, saturation: f64, vibrance: f64, clarity: f64) {
    saturate(frame, saturation);
    scale_offset(frame, vibrance, 0.0);

    if clarity > 1.0 {
        let gray = imageops::grayscale(&*frame);
        let edges = laplacian_filter(&gray);
        let weight = (clarity - 1.0) * CLARITY_WEIGHT;
        for (x, y, pixel) in frame.enumerate_pixels_mut() {
            let edge = edges.get_pixel(x, y).0[0].clamp(0, 255) as f64;
            for channel in pixel.0.iter_mut() {
                *channel = to_u8(*channel as f64 + edge * weight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use uniquify_model::SocialStyle;

    fn flat(value: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(20, 10, Rgb(value))
    }

    #[test]
    fn test_vintage_darkens_corners_more_than_center() {
        let params = SocialParams::Vintage {
            warmth: 1.0,
            vignette: 0.5,
            grain: 0.0,
        };
        let mut frame = flat([200, 200, 200]);
        apply_social(&mut frame, &params, 0, 0);
        let center = frame.get_pixel(10, 5).0[1];
        let corner = frame.get_pixel(0, 0).0[1];
        assert_eq!(center, 200);
        assert!(corner < center);
    }

    #[test]
    fn test_vintage_warmth_shifts_channels() {
        let params = SocialParams::Vintage {
            warmth: 0.9,
            vignette: 0.0,
            grain: 0.0,
        };
        let mut frame = flat([100, 100, 100]);
        apply_social(&mut frame, &params, 0, 0);
        assert_eq!(frame.get_pixel(3, 3).0, [90, 100, 110]);
    }

    #[test]
    fn test_dramatic_scales_levels() {
        let params = SocialParams::for_style(SocialStyle::Dramatic);
        let mut frame = flat([100, 0, 250]);
        apply_social(&mut frame, &params, 0, 0);
        // 100 * 1.15 = 115, * 1.2 = 138, * 0.8 = 110.4
        assert_eq!(frame.get_pixel(0, 0).0, [110, 0, 204]);
    }

    #[test]
    fn test_soft_brightens_flat_frame() {
        let params = SocialParams::Soft {
            blur: 0.5,
            brightness: 5,
            saturation: 1.0,
        };
        let mut frame = flat([50, 50, 50]);
        apply_social(&mut frame, &params, 0, 0);
        let [r, g, b] = frame.get_pixel(10, 5).0;
        assert!((54..=55).contains(&r));
        assert_eq!((r, r), (g, b));
    }

    #[test]
    fn test_vibrant_keeps_dimensions() {
        let params = SocialParams::for_style(SocialStyle::Vibrant);
        let mut frame = RgbImage::from_fn(20, 10, |x, _| Rgb([(x * 12) as u8, 80, 40]));
        apply_social(&mut frame, &params, 0, 0);
        assert_eq!(frame.dimensions(), (20, 10));
    }

    #[test]
    fn test_grain_is_seeded() {
        let params = SocialParams::for_style(SocialStyle::Vintage);
        let mut a = flat([120, 120, 120]);
        let mut b = flat([120, 120, 120]);
        apply_social(&mut a, &params, 11, 2);
        apply_social(&mut b, &params, 11, 2);
        assert_eq!(a, b);
    }
}
