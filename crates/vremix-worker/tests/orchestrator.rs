//! Batch orchestrator integration tests with a fake engine and probe.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vremix_media::{
    FilterGraphCompiler, Invocation, MediaError, MediaResult, StdRandom, StreamProbe,
    TranscodeRunner,
};
use vremix_models::{OutputFormat, ParamSpec, TransformSpec};
use vremix_worker::{
    BatchEvent, BatchOrchestrator, BatchSettings, BatchSummary, CancelFlag, WorkerConfig,
    WorkerError,
};

/// Engine stand-in. Inputs whose name contains `fail` exit non-zero; inputs
/// containing `vanish` behave as if the executable disappeared.
#[derive(Default)]
struct FakeRunner {
    available: bool,
    calls: Mutex<Vec<Invocation>>,
    cancel_after_first: Option<CancelFlag>,
}

impl FakeRunner {
    fn available() -> Self {
        Self {
            available: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodeRunner for FakeRunner {
    fn check_available(&self) -> MediaResult<PathBuf> {
        if self.available {
            Ok(PathBuf::from("/usr/bin/ffmpeg"))
        } else {
            Err(MediaError::FfmpegNotFound)
        }
    }

    async fn run(&self, invocation: &Invocation) -> MediaResult<()> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(flag) = &self.cancel_after_first {
            flag.cancel();
        }

        let name = invocation.subject.to_string_lossy().into_owned();
        if name.contains("vanish") {
            return Err(MediaError::FfmpegNotFound);
        }
        if name.contains("fail") {
            let stderr = format!("{}: Invalid data found when processing input", name);
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with status 1",
                Some(stderr),
                Some(1),
            ));
        }
        Ok(())
    }
}

struct FakeProbe;

#[async_trait]
impl StreamProbe for FakeProbe {
    async fn has_audio(&self, _path: &Path) -> bool {
        true
    }
}

fn compiler() -> FilterGraphCompiler {
    WorkerConfig::default()
        .build_compiler()
        .expect("builtin compiler")
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a video").expect("write input");
    path
}

fn orchestrator(runner: Arc<FakeRunner>, out_dir: &Path) -> BatchOrchestrator {
    BatchOrchestrator::new(
        compiler(),
        runner,
        Arc::new(FakeProbe),
        BatchSettings::new(out_dir),
    )
    .with_random(Box::new(StdRandom::seeded(7)))
}

async fn run_batch(
    orchestrator: BatchOrchestrator,
    spec: TransformSpec,
    files: Vec<PathBuf>,
) -> (Vec<BatchEvent>, BatchSummary) {
    orchestrator
        .start(spec, files)
        .await
        .expect("batch should start")
        .collect()
        .await
        .expect("batch should finish")
}

#[tokio::test]
async fn test_failure_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let files = vec![
        touch(dir.path(), "a.mp4"),
        touch(dir.path(), "b_fail.mp4"),
        touch(dir.path(), "c.mp4"),
    ];
    let runner = Arc::new(FakeRunner::available());

    let (events, summary) = run_batch(
        orchestrator(runner.clone(), &out_dir),
        TransformSpec::default(),
        files.clone(),
    )
    .await;

    assert_eq!(runner.calls().len(), 3);
    assert_eq!(events.len(), 7);

    assert_eq!(
        events[0],
        BatchEvent::Processing {
            index: 0,
            file_name: "a.mp4".to_string()
        }
    );
    assert_eq!(
        events[1],
        BatchEvent::Progress {
            completed: 1,
            attempted: 1,
            total: 3
        }
    );
    match &events[3] {
        BatchEvent::Failed {
            file_name,
            input,
            message,
        } => {
            assert_eq!(file_name, "b_fail.mp4");
            assert_eq!(input, &files[1]);
            assert!(message.contains("Invalid data found"));
        }
        other => panic!("expected failure event, got {:?}", other),
    }
    assert_eq!(
        events[5],
        BatchEvent::Progress {
            completed: 2,
            attempted: 3,
            total: 3
        }
    );
    assert!(events[6].is_terminal());

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcome(), "completed");
    assert_eq!(
        summary.outputs,
        vec![
            out_dir.join("a_processed.mp4"),
            out_dir.join("c_processed.mp4")
        ]
    );
    assert!(out_dir.is_dir());
}

#[tokio::test]
async fn test_failure_message_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let long_name = format!("{}_fail.mp4", "x".repeat(200));
    let files = vec![touch(dir.path(), &long_name)];
    let runner = Arc::new(FakeRunner::available());

    let orchestrator = BatchOrchestrator::new(
        compiler(),
        runner,
        Arc::new(FakeProbe),
        BatchSettings::new(dir.path().join("out")).with_error_tail_chars(40),
    );
    let (events, _) = run_batch(orchestrator, TransformSpec::default(), files).await;

    let message = events
        .iter()
        .find_map(|e| match e {
            BatchEvent::Failed { message, .. } => Some(message.clone()),
            _ => None,
        })
        .expect("failure event");
    assert_eq!(message.chars().count(), 40);
    assert!(message.ends_with("processing input"));
}

#[tokio::test]
async fn test_missing_input_fails_without_engine_call() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::available());

    let (events, summary) = run_batch(
        orchestrator(runner.clone(), &dir.path().join("out")),
        TransformSpec::default(),
        vec![dir.path().join("missing.mp4")],
    )
    .await;

    assert!(runner.calls().is_empty());
    assert!(matches!(events[1], BatchEvent::Failed { .. }));
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_cancel_stops_at_next_file() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        touch(dir.path(), "a.mp4"),
        touch(dir.path(), "b.mp4"),
        touch(dir.path(), "c.mp4"),
    ];
    let cancel = CancelFlag::new();
    let runner = Arc::new(FakeRunner {
        available: true,
        cancel_after_first: Some(cancel.clone()),
        ..Default::default()
    });

    let orchestrator = orchestrator(runner.clone(), &dir.path().join("out")).with_cancel_flag(cancel);
    let (events, summary) = run_batch(orchestrator, TransformSpec::default(), files).await;

    assert_eq!(runner.calls().len(), 1);
    assert_eq!(events.len(), 3);
    assert!(matches!(events[1], BatchEvent::Progress { completed: 1, .. }));
    assert!(summary.cancelled);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.outcome(), "cancelled");
}

#[tokio::test]
async fn test_invalid_spec_rejected_before_any_job() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::available());
    let spec = TransformSpec::default().with_zoom(ParamSpec::range(130, 90));

    let result = orchestrator(runner.clone(), &dir.path().join("out"))
        .start(spec, vec![touch(dir.path(), "a.mp4")])
        .await;

    match result {
        Err(WorkerError::Configuration(msg)) => assert!(msg.contains("zoom")),
        Err(other) => panic!("expected configuration error, got {}", other),
        Ok(_) => panic!("invalid spec should not start"),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_engine_unavailable_rejected_before_any_job() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::default());

    let result = orchestrator(runner.clone(), &dir.path().join("out"))
        .start(TransformSpec::default(), vec![touch(dir.path(), "a.mp4")])
        .await;

    assert!(matches!(result, Err(WorkerError::ResourceUnavailable(_))));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_empty_batch_completes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::available());

    let (events, summary) = run_batch(
        orchestrator(runner, &dir.path().join("out")),
        TransformSpec::default(),
        Vec::new(),
    )
    .await;

    assert_eq!(events, vec![BatchEvent::Completed(BatchSummary::new(0))]);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn test_engine_vanishing_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        touch(dir.path(), "a.mp4"),
        touch(dir.path(), "b_vanish.mp4"),
        touch(dir.path(), "c.mp4"),
    ];
    let runner = Arc::new(FakeRunner::available());

    let (events, summary) = run_batch(
        orchestrator(runner.clone(), &dir.path().join("out")),
        TransformSpec::default(),
        files,
    )
    .await;

    assert_eq!(runner.calls().len(), 2);
    assert!(matches!(events[3], BatchEvent::Failed { .. }));
    assert!(events[4].is_terminal());
    assert_eq!(summary.outcome(), "aborted");
    assert_eq!(summary.attempted, 2);
}

#[tokio::test]
async fn test_same_seed_same_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let files = vec![touch(dir.path(), "a.mp4"), touch(dir.path(), "b.mp4")];
    let spec = TransformSpec::default()
        .with_zoom(ParamSpec::range(90, 130))
        .with_speed(ParamSpec::range(80, 120))
        .with_filter("random")
        .with_filter("random_color");

    let first = Arc::new(FakeRunner::available());
    run_batch(orchestrator(first.clone(), &out_dir), spec.clone(), files.clone()).await;

    let second = Arc::new(FakeRunner::available());
    run_batch(orchestrator(second.clone(), &out_dir), spec, files).await;

    assert_eq!(first.calls().len(), 2);
    assert_eq!(first.calls(), second.calls());
}

#[tokio::test]
async fn test_muted_canvas_job() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let runner = Arc::new(FakeRunner::available());
    let spec = TransformSpec::default()
        .with_output_format(OutputFormat::canvas(1080, 1920))
        .muted();

    let (_, summary) = run_batch(
        orchestrator(runner.clone(), &out_dir),
        spec,
        vec![touch(dir.path(), "clip.mov")],
    )
    .await;

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].has_arg("-an"));
    assert!(!calls[0].args.iter().any(|a| a.contains("anullsrc")));
    assert_eq!(summary.outputs, vec![out_dir.join("clip_reels.mp4")]);
}
