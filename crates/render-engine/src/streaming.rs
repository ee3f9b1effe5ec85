//! Streaming mux backend: raw decoder → per-frame transform → encoder/muxer.
//! Retiming is left to ffmpeg's own `trim`/`setpts`/`atempo` filters in a
//! single pass.

use std::path::Path;

use uniquify_common::{UniqError, UniqResult};
use uniquify_effects::{frame_from_bytes, FrameOp, TimeMap};
use uniquify_model::{Asset, EffectStage, StageParams, TemporalParams};

use crate::backend::{audio_retime_filter, video_retime_filter, BackendSettings, ExecutionBackend};
use crate::ffmpeg::{
    run_ffmpeg, tools_available, AudioInput, EncodeSettings, FrameReader, FrameWriter,
    EVEN_DIMENSIONS_FILTER,
};
use crate::progress::{emit, ProgressSink};

pub const STREAMING_BACKEND: &str = "streaming";

/// Fallback backend (priority 2).
#[derive(Debug, Clone, Default)]
pub struct StreamingBackend {
    settings: BackendSettings,
}

impl StreamingBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }

    fn retime(
        &self,
        stage: &EffectStage,
        params: &TemporalParams,
        input: &Asset,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> UniqResult<()> {
        let map = TimeMap::new(input.duration_secs, input.fps.as_f64(), params);
        let args = retime_args(input, &map, output, &self.settings.encode);
        let stage_name = stage.name();
        run_ffmpeg(&args, map.output_duration(), |fraction| {
            emit(progress, stage_name, fraction, "muxing retimed stream")
        })
        .map_err(|e| UniqError::stage(stage_name, e.to_string()))
    }

    fn transform(
        &self,
        stage: &EffectStage,
        op: FrameOp,
        input: &Asset,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> UniqResult<()> {
        let stage_name = stage.name();
        let (width, height) = (input.width, input.height);
        let audio = input.has_audio.then(|| AudioInput {
            path: input.path.clone(),
            filter: None,
        });

        let mut reader = FrameReader::spawn(stage_name, &input.path, width, height, input.fps)?;
        let mut writer = FrameWriter::spawn(
            stage_name,
            output,
            width,
            height,
            input.fps,
            audio.as_ref(),
            &self.settings.encode,
        )?;

        let expected = input.frame_count().max(1);
        let mut index = 0u64;
        while let Some(bytes) = reader.read_frame()? {
            let mut frame = frame_from_bytes(stage_name, width, height, bytes)?;
            op.apply(&mut frame, index);
            writer.write_frame(frame.as_raw())?;
            index += 1;
            emit(
                progress,
                stage_name,
                index as f64 / expected as f64,
                format!("frame {index}"),
            );
        }

        reader.finish()?;
        writer.finish()?;
        tracing::debug!(stage = stage_name, frames = index, "Stream transformed");
        Ok(())
    }
}

impl ExecutionBackend for StreamingBackend {
    fn name(&self) -> &str {
        STREAMING_BACKEND
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
        tracing::info!(
            backend = STREAMING_BACKEND,
            stage = stage.name(),
            params = %stage.describe(),
            "Rendering stage"
        );
        if let StageParams::Temporal(params) = &stage.params {
            return self.retime(stage, params, input, output, progress);
        }
        match FrameOp::for_stage(stage, self.settings.device) {
            Some(op) => self.transform(stage, op, input, output, progress),
            None => Err(UniqError::stage(stage.name(), "stage has no frame operation")),
        }
    }
}

/// One-pass ffmpeg arguments for a trim + speed change.
fn retime_args(input: &Asset, map: &TimeMap, output: &Path, encode: &EncodeSettings) -> Vec<String> {
    let mut graph = format!(
        "[0:v]{},{EVEN_DIMENSIONS_FILTER}[v]",
        video_retime_filter(map)
    );
    if input.has_audio {
        graph.push_str(&format!(";[0:a]{}[a]", audio_retime_filter(map)));
    }

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.path.display().to_string(),
        "-filter_complex".to_string(),
        graph,
        "-map".to_string(),
        "[v]".to_string(),
    ];
    if input.has_audio {
        args.extend(["-map".to_string(), "[a]".to_string()]);
    }
    args.extend(["-r".to_string(), input.fps.to_string()]);
    args.extend(encode.video_args());
    if input.has_audio {
        args.extend(encode.audio_args());
    }
    args.extend(EncodeSettings::container_args());
    args.push(output.display().to_string());
    args
}
