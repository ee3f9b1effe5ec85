//! ffmpeg process plumbing: encoder arguments, progress-reporting runs, and
//! raw RGB24 frame pipes in both directions.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use uniquify_common::{EncodingConfig, UniqError, UniqResult};
use uniquify_model::FrameRate;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// libx264 with yuv420p needs even dimensions.
pub const EVEN_DIMENSIONS_FILTER: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// Flags every ffmpeg invocation starts with.
const QUIET_ARGS: [&str; 4] = ["-hide_banner", "-nostdin", "-loglevel", "error"];

pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Both ffmpeg and ffprobe are on PATH.
pub fn tools_available() -> bool {
    command_exists(FFMPEG) && command_exists(FFPROBE)
}

pub fn ensure_tools() -> UniqResult<()> {
    for tool in [FFMPEG, FFPROBE] {
        if !command_exists(tool) {
            return Err(UniqError::tool_missing(tool));
        }
    }
    Ok(())
}

/// H.264 + AAC output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub crf: u32,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from(&EncodingConfig::default())
    }
}

impl From<&EncodingConfig> for EncodeSettings {
    fn from(config: &EncodingConfig) -> Self {
        Self {
            crf: config.crf,
            preset: config.preset.clone(),
            audio_bitrate_kbps: config.audio_bitrate_kbps,
        }
    }
}

impl EncodeSettings {
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps.max(32)),
        ]
    }

    pub fn container_args() -> Vec<String> {
        vec!["-movflags".to_string(), "+faststart".to_string()]
    }
}

/// Run ffmpeg with `-progress pipe:1`, reporting completion fractions
/// against `expected_duration_secs`.
///
/// Failures come back as [`UniqError::Pipeline`] carrying ffmpeg's stderr;
/// callers re-wrap them into the error kind of their step.
pub fn run_ffmpeg(
    args: &[String],
    expected_duration_secs: f64,
    mut on_progress: impl FnMut(f64),
) -> UniqResult<()> {
    tracing::debug!(args = ?args, "Running ffmpeg");
    let mut cmd = Command::new(FFMPEG);
    cmd.args(QUIET_ARGS)
        .args(["-nostats", "-progress", "pipe:1"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = spawn(&mut cmd)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| UniqError::pipeline("Failed to capture ffmpeg stdout"))?;
    let stderr_task = drain_stderr(&mut child)?;

    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut state = ProgressState::default();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|e| UniqError::pipeline(format!("Failed reading ffmpeg progress: {e}")))?;
        if bytes == 0 {
            break;
        }
        if let Some((key, value)) = line.trim().split_once('=') {
            state.update(key, value);
            if key == "progress" {
                on_progress(state.fraction(expected_duration_secs));
            }
        }
    }

    let status = child
        .wait()
        .map_err(|e| UniqError::pipeline(format!("Failed to wait on ffmpeg: {e}")))?;
    let stderr_output = join_stderr(stderr_task);
    if !status.success() {
        return Err(UniqError::pipeline(format!(
            "ffmpeg failed (status {status}): {}",
            stderr_output.trim()
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    }
}

/// Decodes a video stream into packed RGB24 frames at a constant rate.
pub struct FrameReader {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    stage: String,
    frame_len: usize,
    exhausted: bool,
}

impl FrameReader {
    pub fn spawn(
        stage: impl Into<String>,
        path: &Path,
        width: u32,
        height: u32,
        fps: FrameRate,
    ) -> UniqResult<Self> {
        let stage = stage.into();
        let mut cmd = Command::new(FFMPEG);
        cmd.args(QUIET_ARGS)
            .arg("-i")
            .arg(path)
            .args(["-map", "0:v:0", "-vf"])
            .arg(format!("fps={fps}"))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = spawn(&mut cmd).map_err(|e| UniqError::stage(&stage, e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UniqError::stage(&stage, "Failed to capture decoder stdout"))?;
        let stderr_task = drain_stderr(&mut child)?;
        tracing::debug!(stage = %stage, pid = child.id(), path = %path.display(), "Decoder started");

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            stderr_task: Some(stderr_task),
            stage,
            frame_len: width as usize * height as usize * 3,
            exhausted: false,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Next frame, or `None` at end of stream. A partial trailing frame is a
    /// stage error.
    pub fn read_frame(&mut self) -> UniqResult<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(UniqError::stage(
                        &self.stage,
                        format!("Failed reading decoded frame: {e}"),
                    ))
                }
            }
        }

        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if filled < self.frame_len {
            self.exhausted = true;
            return Err(UniqError::stage(
                &self.stage,
                format!(
                    "corrupt frame: decoder produced {filled} of {} bytes",
                    self.frame_len
                ),
            ));
        }
        Ok(Some(buf))
    }

    /// Stop the decoder. If the stream was read to the end, a non-zero exit
    /// status is an error; otherwise the process is killed.
    pub fn finish(mut self) -> UniqResult<()> {
        self.stdout.take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if !self.exhausted {
            child.kill().ok();
            child.wait().ok();
            return Ok(());
        }

        let status = child
            .wait()
            .map_err(|e| UniqError::stage(&self.stage, format!("Failed to wait on decoder: {e}")))?;
        let stderr_output = self.stderr_task.take().map(join_stderr).unwrap_or_default();
        if !status.success() {
            return Err(UniqError::stage(
                &self.stage,
                format!("decoder failed (status {status}): {}", stderr_output.trim()),
            ));
        }
        Ok(())
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            child.kill().ok();
            child.wait().ok();
        }
    }
}

/// Audio to mux next to piped frames.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub path: PathBuf,
    /// Optional `-af` chain (trim / tempo).
    pub filter: Option<String>,
}

/// Encodes piped RGB24 frames into an H.264/AAC mp4.
pub struct FrameWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    stage: String,
    frame_len: usize,
    frames_written: u64,
}

impl FrameWriter {
    pub fn spawn(
        stage: impl Into<String>,
        output: &Path,
        width: u32,
        height: u32,
        fps: FrameRate,
        audio: Option<&AudioInput>,
        encode: &EncodeSettings,
    ) -> UniqResult<Self> {
        let stage = stage.into();
        let mut cmd = Command::new(FFMPEG);
        cmd.args(QUIET_ARGS)
            .arg("-y")
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-s"])
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.to_string())
            .args(["-i", "pipe:0"]);

        if let Some(audio) = audio {
            cmd.arg("-i").arg(&audio.path);
        }
        cmd.args(["-map", "0:v:0"]);
        if let Some(audio) = audio {
            cmd.args(["-map", "1:a:0?"]);
            if let Some(filter) = &audio.filter {
                cmd.arg("-af").arg(filter);
            }
        }
        cmd.args(["-vf", EVEN_DIMENSIONS_FILTER]).args(encode.video_args());
        if audio.is_some() {
            cmd.args(encode.audio_args()).arg("-shortest");
        }
        cmd.args(EncodeSettings::container_args())
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = spawn(&mut cmd).map_err(|e| UniqError::stage(&stage, e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| UniqError::stage(&stage, "Failed to capture encoder stdin"))?;
        let stderr_task = drain_stderr(&mut child)?;
        tracing::debug!(stage = %stage, pid = child.id(), output = %output.display(), "Encoder started");

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            stage,
            frame_len: width as usize * height as usize * 3,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &[u8]) -> UniqResult<()> {
        if frame.len() != self.frame_len {
            return Err(UniqError::stage(
                &self.stage,
                format!(
                    "corrupt frame: {} bytes, encoder expects {}",
                    frame.len(),
                    self.frame_len
                ),
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| UniqError::stage(&self.stage, "encoder input already closed"))?;
        if let Err(e) = stdin.write_all(frame) {
            let detail = self.abort();
            return Err(UniqError::stage(
                &self.stage,
                format!("encoder rejected frame: {e}: {}", detail.trim()),
            ));
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Close the pipe and wait for the encoder to finish the file.
    pub fn finish(mut self) -> UniqResult<()> {
        self.stdin.take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| UniqError::stage(&self.stage, format!("Failed to wait on encoder: {e}")))?;
        let stderr_output = self.stderr_task.take().map(join_stderr).unwrap_or_default();
        if !status.success() {
            return Err(UniqError::stage(
                &self.stage,
                format!("encoder failed (status {status}): {}", stderr_output.trim()),
            ));
        }
        if self.frames_written == 0 {
            return Err(UniqError::stage(&self.stage, "no frames were encoded"));
        }
        Ok(())
    }

    fn abort(&mut self) -> String {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            child.kill().ok();
            child.wait().ok();
        }
        self.stderr_task.take().map(join_stderr).unwrap_or_default()
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

fn spawn(cmd: &mut Command) -> UniqResult<Child> {
    cmd.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            UniqError::tool_missing(cmd.get_program().to_string_lossy())
        } else {
            UniqError::pipeline(format!(
                "Failed to start {}: {e}",
                cmd.get_program().to_string_lossy()
            ))
        }
    })
}

/// Read stderr on its own thread so a chatty child never blocks on a full pipe.
fn drain_stderr(child: &mut Child) -> UniqResult<JoinHandle<String>> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| UniqError::pipeline("Failed to capture ffmpeg stderr"))?;
    Ok(std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    }))
}

fn join_stderr(task: JoinHandle<String>) -> String {
    task.join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
}
