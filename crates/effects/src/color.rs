//! 8-bit colour helpers shared by the visual and social stages.

use image::{Rgb, RgbImage};

/// Round and clamp to a `u8`.
#[inline]
pub fn to_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// `clamp(v * alpha + beta)` on every channel.
pub fn scale_offset(frame: &mut RgbImage, alpha: f64, beta: f64) {
    for value in frame.iter_mut() {
        *value = to_u8(*value as f64 * alpha + beta);
    }
}

/// Additive brightness in 8-bit levels.
pub fn add_brightness(frame: &mut RgbImage, delta: i32) {
    if delta == 0 {
        return;
    }
    scale_offset(frame, 1.0, delta as f64);
}

/// Scale HSV saturation of one pixel by `factor`, keeping hue and value.
///
/// With `V = max(r, g, b)` and `S = (V - min) / V`, the new saturation is
/// `S' = min(S * factor, 1)` and each channel becomes `V - (V - c) * S' / S`.
#[inline]
pub fn saturate_pixel(pixel: &mut Rgb<u8>, factor: f64) {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b) as f64;
    let min = r.min(g).min(b) as f64;
    if max <= 0.0 || max == min {
        return;
    }
    let s = (max - min) / max;
    let s_new = (s * factor).clamp(0.0, 1.0);
    let k = s_new / s;
    for channel in pixel.0.iter_mut() {
        *channel = to_u8(max - (max - *channel as f64) * k);
    }
}

/// Apply [`saturate_pixel`] to every pixel.
pub fn saturate(frame: &mut RgbImage, factor: f64) {
    if (factor - 1.0).abs() < f64::EPSILON {
        return;
    }
    for pixel in frame.pixels_mut() {
        saturate_pixel(pixel, factor);
    }
}

/// Mean of all samples, handy for tests and sanity checks.
pub fn mean_level(frame: &RgbImage) -> f64 {
    let raw = frame.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    raw.iter().map(|v| *v as f64).sum::<f64>() / raw.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_u8_clamps() {
        assert_eq!(to_u8(-3.0), 0);
        assert_eq!(to_u8(300.0), 255);
        assert_eq!(to_u8(127.6), 128);
    }

    #[test]
    fn test_brightness_saturates() {
        let mut frame = RgbImage::from_pixel(2, 2, Rgb([250, 10, 128]));
        add_brightness(&mut frame, 10);
        assert_eq!(frame.get_pixel(0, 0).0, [255, 20, 138]);
        add_brightness(&mut frame, -30);
        assert_eq!(frame.get_pixel(1, 1).0, [225, 0, 108]);
    }

    #[test]
    fn test_gray_is_unaffected_by_saturation() {
        let mut pixel = Rgb([90, 90, 90]);
        saturate_pixel(&mut pixel, 1.5);
        assert_eq!(pixel.0, [90, 90, 90]);
    }

    #[test]
    fn test_full_desaturation_goes_gray() {
        let mut pixel = Rgb([200, 100, 50]);
        saturate_pixel(&mut pixel, 0.0);
        assert_eq!(pixel.0, [200, 200, 200]);
    }

    proptest! {
        #[test]
        fn prop_saturation_keeps_value_and_order(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255, factor in 0.0f64..2.0) {
            let mut pixel = Rgb([r, g, b]);
            saturate_pixel(&mut pixel, factor);
            let [nr, ng, nb] = pixel.0;
            prop_assert_eq!(nr.max(ng).max(nb), r.max(g).max(b));
            if r >= g { prop_assert!(nr >= ng); }
            if g >= b { prop_assert!(ng >= nb); }
        }

        #[test]
        fn prop_unit_saturation_is_identity(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let mut pixel = Rgb([r, g, b]);
            saturate_pixel(&mut pixel, 1.0);
            prop_assert_eq!(pixel.0, [r, g, b]);
        }
    }
}
