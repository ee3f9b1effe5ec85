//! Compositing backend: a decoded clip with per-frame callables composed on
//! top, rendered by picking the exact source frame for every output frame.
//!
//! ```text
//! source.mp4 ──decode──► frame n ──TimeMap──► output frame i
//!                                               │
//!                                        FrameOp::apply(i)
//!                                               │
//! source audio ──atrim/atempo───────────────► encode ──► output.mp4
//! ```

use std::path::Path;

use uniquify_common::{UniqError, UniqResult};
use uniquify_effects::{frame_from_bytes, FrameOp, TimeMap};
use uniquify_model::{Asset, EffectStage, StageParams};

use crate::backend::{audio_retime_filter, BackendSettings, ExecutionBackend};
use crate::ffmpeg::{tools_available, AudioInput, EncodeSettings, FrameReader, FrameWriter};
use crate::progress::{emit, ProgressSink};

pub const COMPOSITING_BACKEND: &str = "compositing";

/// A source asset plus the time mapping and frame operations to render it
/// with.
#[derive(Debug, Clone)]
pub struct Clip {
    source: Asset,
    time_map: TimeMap,
    ops: Vec<FrameOp>,
}

impl Clip {
    pub fn open(source: &Asset) -> Self {
        Self {
            time_map: TimeMap::identity(source.duration_secs, source.fps.as_f64()),
            source: source.clone(),
            ops: Vec::new(),
        }
    }

    pub fn with_time_map(mut self, time_map: TimeMap) -> Self {
        self.time_map = time_map;
        self
    }

    pub fn with_op(mut self, op: FrameOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Compose a stage onto the clip.
    pub fn with_stage(self, stage: &EffectStage, settings: &BackendSettings) -> Self {
        let clip = match &stage.params {
            StageParams::Temporal(params) => {
                let map = TimeMap::new(self.source.duration_secs, self.source.fps.as_f64(), params);
                self.with_time_map(map)
            }
            _ => self,
        };
        match FrameOp::for_stage(stage, settings.device) {
            Some(op) => clip.with_op(op),
            None => clip,
        }
    }

    pub fn time_map(&self) -> &TimeMap {
        &self.time_map
    }

    pub fn output_frame_count(&self) -> u64 {
        self.time_map.output_frame_count()
    }

    fn audio(&self) -> Option<AudioInput> {
        if !self.source.has_audio {
            return None;
        }
        Some(AudioInput {
            path: self.source.path.clone(),
            filter: (!self.time_map.is_identity()).then(|| audio_retime_filter(&self.time_map)),
        })
    }

    /// Decode, compose and encode every output frame. Returns the number of
    /// frames written.
    pub fn render(
        &self,
        stage_name: &str,
        output: &Path,
        encode: &EncodeSettings,
        progress: &dyn ProgressSink,
    ) -> UniqResult<u64> {
        let total = self.output_frame_count();
        if total == 0 {
            return Err(UniqError::stage(stage_name, "clip has no output frames"));
        }
        let (width, height) = (self.source.width, self.source.height);

        let mut reader = FrameReader::spawn(
            stage_name,
            &self.source.path,
            width,
            height,
            self.source.fps,
        )?;
        let audio = self.audio();
        let mut writer = FrameWriter::spawn(
            stage_name,
            output,
            width,
            height,
            self.source.fps,
            audio.as_ref(),
            encode,
        )?;

        let mut held: Option<Vec<u8>> = None;
        let mut held_index: Option<u64> = None;
        let mut decoded = 0u64;

        for out_index in 0..total {
            let target = self.time_map.source_frame(out_index);
            while held_index.map_or(true, |index| index < target) {
                match reader.read_frame()? {
                    Some(buf) => {
                        held = Some(buf);
                        held_index = Some(decoded);
                        decoded += 1;
                    }
                    // Container duration can overshoot the last decodable
                    // frame; hold the last one.
                    None => break,
                }
            }

            let bytes = held
                .clone()
                .ok_or_else(|| UniqError::stage(stage_name, "source produced no frames"))?;
            let mut frame = frame_from_bytes(stage_name, width, height, bytes)?;
            for op in &self.ops {
                op.apply(&mut frame, out_index);
            }
            writer.write_frame(frame.as_raw())?;

            emit(
                progress,
                stage_name,
                (out_index + 1) as f64 / total as f64,
                format!("frame {}/{total}", out_index + 1),
            );
        }

        reader.finish()?;
        let written = writer.frames_written();
        writer.finish()?;
        tracing::debug!(
            stage = stage_name,
            frames = written,
            decoded,
            "Clip rendered"
        );
        Ok(written)
    }
}

/// Default backend (priority 1).
#[derive(Debug, Clone, Default)]
pub struct CompositingBackend {
    settings: BackendSettings,
}

impl CompositingBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }
}

impl ExecutionBackend for CompositingBackend {
    fn name(&self) -> &str {
        COMPOSITING_BACKEND
    }

    fn is_available(&self) -> bool {
        tools_available()
    }

    fn apply_stage(
        &self,
        stage: &EffectStage,
        input: &Asset,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> UniqResult<()> {
        let clip = Clip::open(input).with_stage(stage, &self.settings);
        tracing::info!(
            backend = COMPOSITING_BACKEND,
            stage = stage.name(),
            params = %stage.describe(),
            output_frames = clip.output_frame_count(),
            "Rendering stage"
        );
        clip.render(stage.name(), output, &self.settings.encode, progress)?;
        Ok(())
    }
}
