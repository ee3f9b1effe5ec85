use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uniquify_common::{CancelToken, UniqError, UniqResult};
use uniquify_model::{Asset, EffectKind, EffectStage, FrameRate, PipelineSpec};
use uniquify_render_engine::{
    run_pipeline, ExecutionBackend, FallbackCoordinator, MediaProbe, PipelineContext,
    ProcessOptions, ProgressSink, VideoProcessor,
};

/// Treats any existing file as a 4 s, 25 fps clip.
struct FakeProbe;

impl MediaProbe for FakeProbe {
    fn probe(&self, path: &Path) -> UniqResult<Asset> {
        if !path.exists() {
            return Err(UniqError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Asset {
            path: path.to_path_buf(),
            duration_secs: 4.0,
            fps: FrameRate::integer(25),
            width: 32,
            height: 18,
            codec: "h264".to_string(),
            has_audio: false,
        })
    }
}

/// Appends the stage name to the input file's text; fails on stage
/// `fail_at` when set.
struct RecordingBackend {
    name: &'static str,
    fail_at: Option<usize>,
    calls: AtomicUsize,
}

impl RecordingBackend {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            fail_at: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(name: &'static str, stage: usize) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::new(name)
        }
    }
}

impl ExecutionBackend for RecordingBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn apply_stage(
        &self,
        stage: &EffectStage,
        input: &Asset,
        output: &Path,
        _progress: &dyn ProgressSink,
    ) -> UniqResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(call) {
            return Err(UniqError::stage(stage.name(), "forced failure"));
        }
        let mut text = std::fs::read_to_string(&input.path)?;
        text.push_str(stage.name());
        text.push('\n');
        std::fs::write(output, text)?;
        Ok(())
    }
}

struct UnavailableBackend;

impl ExecutionBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn apply_stage(&self, _: &EffectStage, _: &Asset, _: &Path, _: &dyn ProgressSink) -> UniqResult<()> {
        unreachable!("unavailable backends are never asked to render")
    }
}

fn input_file(dir: &Path) -> PathBuf {
    let path = dir.join("input.mp4");
    std::fs::write(&path, "input\n").unwrap();
    path
}

fn spec() -> PipelineSpec {
    PipelineSpec::build(&[EffectKind::Temporal, EffectKind::Visual, EffectKind::Social], 7)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn pipeline_runs_stages_in_order_and_keeps_only_final_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let workspace = dir.path().join("work");
    std::fs::create_dir_all(&workspace).unwrap();

    let asset = FakeProbe.probe(&input).unwrap();
    let backend = RecordingBackend::new("fake");
    let ctx = PipelineContext::new(&workspace).with_label("clip");
    let output = run_pipeline(&asset, &spec(), &backend, &FakeProbe, &ctx).unwrap();

    assert_eq!(
        std::fs::read_to_string(&output.path).unwrap(),
        "input\ntemporal\nvisual\nsocial\n"
    );
    assert_eq!(files_in(&workspace), vec!["clip_fake_s02_social.mp4"]);
    assert!(input.exists());
}

#[test]
fn pipeline_failure_removes_every_intermediate() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let workspace = dir.path().join("work");
    std::fs::create_dir_all(&workspace).unwrap();

    let asset = FakeProbe.probe(&input).unwrap();
    let backend = RecordingBackend::failing_at("fake", 2);
    let ctx = PipelineContext::new(&workspace);
    let err = run_pipeline(&asset, &spec(), &backend, &FakeProbe, &ctx).unwrap_err();

    assert!(matches!(err, UniqError::Stage { .. }));
    assert!(files_in(&workspace).is_empty());
    assert!(input.exists());
}

#[test]
fn empty_pipeline_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let asset = FakeProbe.probe(&input).unwrap();
    let empty = PipelineSpec::from_stages(Vec::new(), 0);
    let ctx = PipelineContext::new(dir.path());
    assert!(matches!(
        run_pipeline(&asset, &empty, &RecordingBackend::new("fake"), &FakeProbe, &ctx),
        Err(UniqError::Pipeline { .. })
    ));
}

#[test]
fn cancelled_pipeline_stops_before_first_stage() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let asset = FakeProbe.probe(&input).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let backend = RecordingBackend::new("fake");
    let ctx = PipelineContext::new(dir.path()).with_cancel(cancel);

    let err = run_pipeline(&asset, &spec(), &backend, &FakeProbe, &ctx).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn fallback_reruns_whole_pipeline_on_second_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let asset = FakeProbe.probe(&input).unwrap();
    let primary = Arc::new(RecordingBackend::failing_at("primary", 1));
    let secondary = Arc::new(RecordingBackend::new("secondary"));
    let backends: Vec<Arc<dyn ExecutionBackend>> = vec![primary.clone(), secondary.clone()];
    let coordinator = FallbackCoordinator::new(backends);

    let ctx = PipelineContext::new(dir.path());
    let outcome = coordinator.run(&asset, &spec(), &FakeProbe, &ctx).unwrap();

    assert_eq!(outcome.backend, "secondary");
    assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 3);
    // Restarted from the original input, not from the primary's partial output.
    assert_eq!(
        std::fs::read_to_string(&outcome.asset.path).unwrap(),
        "input\ntemporal\nvisual\nsocial\n"
    );
}

#[test]
fn fallback_aggregates_both_failures() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let asset = FakeProbe.probe(&input).unwrap();
    let backends: Vec<Arc<dyn ExecutionBackend>> = vec![
        Arc::new(UnavailableBackend),
        Arc::new(RecordingBackend::failing_at("broken", 0)),
    ];
    let coordinator = FallbackCoordinator::new(backends);

    let ctx = PipelineContext::new(dir.path());
    match coordinator.run(&asset, &spec(), &FakeProbe, &ctx) {
        Err(UniqError::Backend { attempts }) => {
            let names: Vec<&str> = attempts.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, vec!["unavailable", "broken"]);
            assert!(attempts[0].1.contains("not available"));
        }
        other => panic!("expected aggregated backend error, got {other:?}"),
    }
}

#[test]
fn processor_places_output_and_reports_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_file(dir.path());
    let output = dir.path().join("out").join("result.mp4");
    let backends: Vec<Arc<dyn ExecutionBackend>> = vec![
        Arc::new(RecordingBackend::failing_at("primary", 0)),
        Arc::new(RecordingBackend::new("secondary")),
    ];
    let coordinator = FallbackCoordinator::new(backends);
    let processor = VideoProcessor::new(coordinator, Arc::new(FakeProbe), ProcessOptions::default());

    let report = processor.process(&input, &output, &spec()).unwrap();
    assert_eq!(report.backend, "secondary");
    assert_eq!(report.chunks, 1);
    assert_eq!(report.output, output);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "input\ntemporal\nvisual\nsocial\n"
    );
    // Scratch directory is gone; only the result remains.
    assert_eq!(files_in(&dir.path().join("out")), vec!["result.mp4"]);
}
