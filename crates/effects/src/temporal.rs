//! Output-to-source time mapping for trim + speed changes.

use uniquify_model::TemporalParams;

/// Maps output frames to source frames.
///
/// The source is trimmed to `[trim_start, trim_end)` and then played at
/// `speed`, so output time `t` shows source time `trim_start + t * speed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeMap {
    fps: f64,
    source_duration: f64,
    trim_start: f64,
    trim_end: f64,
    speed: f64,
}

impl TimeMap {
    /// A map that shows every source frame once.
    pub fn identity(source_duration: f64, fps: f64) -> Self {
        Self::build(source_duration, fps, 0.0, 0.0, 1.0)
    }

    pub fn new(source_duration: f64, fps: f64, params: &TemporalParams) -> Self {
        Self::build(
            source_duration,
            fps,
            params.trim_start_frac,
            params.trim_end_frac,
            params.speed,
        )
    }

    fn build(source_duration: f64, fps: f64, start_frac: f64, end_frac: f64, speed: f64) -> Self {
        let source_duration = source_duration.max(0.0);
        let start_frac = start_frac.clamp(0.0, 0.5);
        let end_frac = end_frac.clamp(0.0, 0.5);
        Self {
            fps: if fps > 0.0 { fps } else { 1.0 },
            source_duration,
            trim_start: source_duration * start_frac,
            trim_end: source_duration * (1.0 - end_frac),
            speed: if speed > 0.0 { speed } else { 1.0 },
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Source seconds kept by the trim, `[start, end)`.
    pub fn trim_window(&self) -> (f64, f64) {
        (self.trim_start, self.trim_end)
    }

    /// `(trim_end - trim_start) / speed`
    pub fn output_duration(&self) -> f64 {
        ((self.trim_end - self.trim_start) / self.speed).max(0.0)
    }

    /// Frames in the output at the source frame rate.
    pub fn output_frame_count(&self) -> u64 {
        let exact = self.output_duration() * self.fps;
        (exact - 1e-6).ceil().max(0.0) as u64
    }

    /// Frames in the untouched source.
    pub fn source_frame_count(&self) -> u64 {
        (self.source_duration * self.fps).round().max(1.0) as u64
    }

    /// Source time shown at output frame `output_index`.
    pub fn source_time(&self, output_index: u64) -> f64 {
        self.trim_start + (output_index as f64 / self.fps) * self.speed
    }

    /// Source frame shown at output frame `output_index`, clamped to the last
    /// source frame.
    pub fn source_frame(&self, output_index: u64) -> u64 {
        let frame = (self.source_time(output_index) * self.fps + 1e-6).floor() as u64;
        frame.min(self.source_frame_count() - 1)
    }

    pub fn is_identity(&self) -> bool {
        self.trim_start == 0.0
            && self.trim_end == self.source_duration
            && (self.speed - 1.0).abs() < f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity_maps_frame_to_itself() {
        let map = TimeMap::identity(10.0, 30.0);
        assert!(map.is_identity());
        assert_eq!(map.output_frame_count(), 300);
        for i in [0, 1, 150, 299] {
            assert_eq!(map.source_frame(i), i);
        }
    }

    #[test]
    fn test_double_speed_skips_frames() {
        let params = TemporalParams {
            speed: 2.0,
            trim_start_frac: 0.0,
            trim_end_frac: 0.0,
        };
        let map = TimeMap::new(10.0, 30.0, &params);
        assert!((map.output_duration() - 5.0).abs() < 1e-9);
        assert_eq!(map.output_frame_count(), 150);
        assert_eq!(map.source_frame(1), 2);
        assert_eq!(map.source_frame(149), 298);
    }

    #[test]
    fn test_trim_shifts_start() {
        let params = TemporalParams {
            speed: 1.0,
            trim_start_frac: 0.05,
            trim_end_frac: 0.05,
        };
        let map = TimeMap::new(10.0, 30.0, &params);
        let (start, end) = map.trim_window();
        assert!((start - 0.5).abs() < 1e-9 && (end - 9.5).abs() < 1e-9);
        assert!((map.output_duration() - 9.0).abs() < 1e-9);
        assert_eq!(map.source_frame(0), 15);
    }

    proptest! {
        #[test]
        fn prop_source_frames_are_monotonic_and_bounded(
            duration in 0.5f64..120.0,
            fps in prop::sample::select(vec![24.0, 25.0, 29.97, 30.0, 60.0]),
            speed in 0.5f64..2.0,
            head in 0.0f64..0.05,
            tail in 0.0f64..0.05,
        ) {
            let params = TemporalParams { speed, trim_start_frac: head, trim_end_frac: tail };
            let map = TimeMap::new(duration, fps, &params);
            let expected = duration * (1.0 - head - tail) / speed;
            prop_assert!((map.output_duration() - expected).abs() < 1e-9);

            let mut previous = 0;
            for i in 0..map.output_frame_count() {
                let frame = map.source_frame(i);
                prop_assert!(frame >= previous);
                prop_assert!(frame < map.source_frame_count());
                previous = frame;
            }
        }
    }
}
