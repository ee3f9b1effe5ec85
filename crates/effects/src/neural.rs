//! Neural stage: per-frame gamma, channel shift and occasional box blur.
//!
//! Every frame draws fresh values from `(stage_seed, frame_index)`, so the
//! output does not depend on which device ran it or in what order.

use image::RgbImage;
use rand::Rng;
use rayon::prelude::*;
use uniquify_common::ComputeDevice;
use uniquify_model::NeuralParams;

use crate::noise::frame_rng;

/// Where the pixel loops actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecDevice {
    /// Sequential rows on the calling thread.
    Cpu,
    /// Rows spread over the rayon pool.
    Accelerator,
}

impl ExecDevice {
    /// Resolve the configured device. `Auto` picks the accelerator when the
    /// pool has more than one thread.
    pub fn resolve(requested: ComputeDevice) -> Self {
        let device = match requested {
            ComputeDevice::Cpu => ExecDevice::Cpu,
            ComputeDevice::Accelerator => ExecDevice::Accelerator,
            ComputeDevice::Auto => {
                if rayon::current_num_threads() > 1 {
                    ExecDevice::Accelerator
                } else {
                    ExecDevice::Cpu
                }
            }
        };
        tracing::debug!(?requested, ?device, "Resolved compute device");
        device
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecDevice::Cpu => "cpu",
            ExecDevice::Accelerator => "accelerator",
        }
    }
}

/// Values drawn for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuralFrameParams {
    pub gamma: f64,
    pub shift: [f64; 3],
    /// Box blur kernel size (3 or 5), if this frame is blurred.
    pub blur_kernel: Option<usize>,
}

pub fn sample_frame_params(
    params: &NeuralParams,
    stage_seed: u64,
    frame_index: u64,
) -> NeuralFrameParams {
    let mut rng = frame_rng(stage_seed, frame_index);
    let (lo, hi) = if params.gamma_min <= params.gamma_max {
        (params.gamma_min, params.gamma_max)
    } else {
        (params.gamma_max, params.gamma_min)
    };
    let gamma = rng.gen_range(lo..=hi);
    let shift_bound = params.shift.abs();
    let shift = [
        rng.gen_range(-shift_bound..=shift_bound),
        rng.gen_range(-shift_bound..=shift_bound),
        rng.gen_range(-shift_bound..=shift_bound),
    ];
    let blur_kernel = if rng.gen_bool(params.blur_probability.clamp(0.0, 1.0)) {
        Some(if rng.gen_bool(0.5) { 3 } else { 5 })
    } else {
        None
    };
    NeuralFrameParams {
        gamma,
        shift,
        blur_kernel,
    }
}

/// Apply the neural stage to one frame.
pub fn apply_neural(
    frame: &mut RgbImage,
    params: &NeuralParams,
    stage_seed: u64,
    frame_index: u64,
    device: ExecDevice,
) {
    let drawn = sample_frame_params(params, stage_seed, frame_index);
    apply_frame_params(frame, &drawn, device);
}

/// Apply already-drawn values to one frame.
pub fn apply_frame_params(frame: &mut RgbImage, drawn: &NeuralFrameParams, device: ExecDevice) {
    let (width, height) = frame.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return;
    }
    let row_len = width * 3;
    let lut = build_lut(drawn);
    let data: &mut [u8] = &mut **frame;

    match drawn.blur_kernel {
        None => for_rows(data, row_len, device, |_, row| {
            for (i, value) in row.iter_mut().enumerate() {
                *value = to_level(lut[i % 3][*value as usize]);
            }
        }),
        Some(kernel) => {
            let levels: Vec<f32> = data
                .iter()
                .enumerate()
                .map(|(i, v)| lut[i % 3][*v as usize])
                .collect();
            let radius = (kernel / 2) as isize;
            let area = (kernel * kernel) as f32;
            for_rows(data, row_len, device, |y, row| {
                for x in 0..width {
                    for c in 0..3 {
                        let mut sum = 0.0f32;
                        for dy in -radius..=radius {
                            let sy = clamp_index(y as isize + dy, height);
                            for dx in -radius..=radius {
                                let sx = clamp_index(x as isize + dx, width);
                                sum += levels[sy * row_len + sx * 3 + c];
                            }
                        }
                        row[x * 3 + c] = to_level(sum / area);
                    }
                }
            });
        }
    }
}

/// Per-channel `clamp(v^gamma + shift)` in unit range for every 8-bit level.
fn build_lut(drawn: &NeuralFrameParams) -> [[f32; 256]; 3] {
    let mut lut = [[0.0f32; 256]; 3];
    for (c, table) in lut.iter_mut().enumerate() {
        for (level, slot) in table.iter_mut().enumerate() {
            let unit = level as f64 / 255.0;
            *slot = (unit.powf(drawn.gamma) + drawn.shift[c]).clamp(0.0, 1.0) as f32;
        }
    }
    lut
}

#[inline]
fn to_level(unit: f32) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

fn for_rows<T, F>(data: &mut [T], row_len: usize, device: ExecDevice, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    match device {
        ExecDevice::Cpu => data
            .chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row)),
        ExecDevice::Accelerator => data
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn pattern() -> RgbImage {
        RgbImage::from_fn(24, 16, |x, y| {
            Rgb([(x * 10) as u8, (y * 15) as u8, ((x + y) * 5) as u8])
        })
    }

    #[test]
    fn test_devices_agree() {
        let params = NeuralParams::default();
        for frame_index in 0..8 {
            let mut cpu = pattern();
            let mut acc = pattern();
            apply_neural(&mut cpu, &params, 99, frame_index, ExecDevice::Cpu);
            apply_neural(&mut acc, &params, 99, frame_index, ExecDevice::Accelerator);
            assert_eq!(cpu, acc, "frame {frame_index} differs between devices");
        }
    }

    #[test]
    fn test_sampled_values_in_range() {
        let params = NeuralParams::default();
        let mut blurred = 0;
        for frame_index in 0..500 {
            let drawn = sample_frame_params(&params, 3, frame_index);
            assert!((0.9..=1.1).contains(&drawn.gamma));
            assert!(drawn.shift.iter().all(|s| s.abs() <= 0.05));
            if let Some(k) = drawn.blur_kernel {
                assert!(k == 3 || k == 5);
                blurred += 1;
            }
        }
        // p = 0.3 over 500 frames
        assert!((100..=200).contains(&blurred), "blurred {blurred}");
    }

    #[test]
    fn test_neutral_values_are_identity() {
        let drawn = NeuralFrameParams {
            gamma: 1.0,
            shift: [0.0; 3],
            blur_kernel: None,
        };
        let mut frame = pattern();
        apply_frame_params(&mut frame, &drawn, ExecDevice::Cpu);
        assert_eq!(frame, pattern());
    }

    #[test]
    fn test_box_blur_keeps_flat_frame() {
        let drawn = NeuralFrameParams {
            gamma: 1.0,
            shift: [0.0; 3],
            blur_kernel: Some(5),
        };
        let mut frame = RgbImage::from_pixel(9, 7, Rgb([40, 120, 200]));
        apply_frame_params(&mut frame, &drawn, ExecDevice::Accelerator);
        assert_eq!(frame.get_pixel(0, 0).0, [40, 120, 200]);
        assert_eq!(frame.get_pixel(8, 6).0, [40, 120, 200]);
    }

    #[test]
    fn test_explicit_devices_resolve_as_requested() {
        assert_eq!(ExecDevice::resolve(ComputeDevice::Cpu), ExecDevice::Cpu);
        assert_eq!(
            ExecDevice::resolve(ComputeDevice::Accelerator),
            ExecDevice::Accelerator
        );
    }
}
