//! Sequential batch orchestration.
//!
//! A batch runs on its own tokio task, one file at a time. Each file is
//! sampled, probed, compiled and handed to the engine; its outcome is
//! reported on the event channel before the next file starts. A failed file
//! never stops the batch unless the engine itself has disappeared.
//!
//! Cancellation is cooperative: the flag is checked before each file, so an
//! engine process that is already running is allowed to finish.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use vremix_media::{
    FilterGraphCompiler, MediaError, MediaResult, ParameterSampler, RandomSource, StdRandom,
    StreamProbe, TranscodeRunner,
};
use vremix_models::{display_name, Job, SourceInfo, TransformSpec};

use crate::error::{WorkerError, WorkerResult};
use crate::events::{BatchEvent, BatchSummary};
use crate::logging::JobLogger;
use crate::metrics;
use crate::output::output_path_for;

/// Shared cancel request, settable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-batch settings.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Directory every output is written to
    pub out_dir: PathBuf,
    /// Characters of engine diagnostics carried in a failure event
    pub error_tail_chars: usize,
}

impl BatchSettings {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            error_tail_chars: 500,
        }
    }

    pub fn with_error_tail_chars(mut self, chars: usize) -> Self {
        self.error_tail_chars = chars;
        self
    }
}

/// Runs a list of files through the compiler and the engine.
///
/// `start` consumes the orchestrator, so a batch cannot be started twice.
pub struct BatchOrchestrator {
    compiler: Arc<FilterGraphCompiler>,
    runner: Arc<dyn TranscodeRunner>,
    probe: Arc<dyn StreamProbe>,
    rng: Box<dyn RandomSource>,
    settings: BatchSettings,
    cancel: CancelFlag,
}

impl BatchOrchestrator {
    pub fn new(
        compiler: FilterGraphCompiler,
        runner: Arc<dyn TranscodeRunner>,
        probe: Arc<dyn StreamProbe>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            compiler: Arc::new(compiler),
            runner,
            probe,
            rng: Box::new(StdRandom::from_os()),
            settings,
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the random source (e.g. with a seeded one).
    pub fn with_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Use an externally owned cancel flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the batch at the next file boundary.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Validate, check the engine, create the output directory, then spawn
    /// the run loop.
    pub async fn start(self, spec: TransformSpec, files: Vec<PathBuf>) -> WorkerResult<BatchHandle> {
        spec.validate()?;

        let engine = self.runner.check_available()?;
        debug!(engine = %engine.display(), "Engine available");

        tokio::fs::create_dir_all(&self.settings.out_dir)
            .await
            .map_err(|e| {
                WorkerError::configuration(format!(
                    "cannot create output directory {}: {}",
                    self.settings.out_dir.display(),
                    e
                ))
            })?;

        let spec = drop_missing_overlay(spec);

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.clone();

        let run = BatchRun {
            compiler: self.compiler,
            runner: self.runner,
            probe: self.probe,
            rng: self.rng,
            settings: self.settings,
            cancel: self.cancel,
            spec,
            events: tx,
        };

        let task = tokio::spawn(run.execute(files));

        Ok(BatchHandle {
            events: rx,
            cancel,
            task,
        })
    }
}

fn drop_missing_overlay(mut spec: TransformSpec) -> TransformSpec {
    if let Some(overlay) = &spec.overlay {
        if !overlay.path.exists() {
            warn!(
                overlay = %overlay.path.display(),
                "Overlay file not found, continuing without overlay"
            );
            spec.overlay = None;
        }
    }
    spec
}

/// Handle to a running batch.
pub struct BatchHandle {
    events: mpsc::UnboundedReceiver<BatchEvent>,
    cancel: CancelFlag,
    task: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// Next event, or `None` once the batch has finished and all events were read.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Request cancellation at the next file boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for the run loop to finish.
    pub async fn wait(self) -> WorkerResult<BatchSummary> {
        self.task
            .await
            .map_err(|e| WorkerError::internal(format!("batch task failed: {}", e)))
    }

    /// Drain every event, then return them with the summary.
    pub async fn collect(mut self) -> WorkerResult<(Vec<BatchEvent>, BatchSummary)> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let summary = self.wait().await?;
        Ok((events, summary))
    }
}

/// State owned by the spawned run loop.
struct BatchRun {
    compiler: Arc<FilterGraphCompiler>,
    runner: Arc<dyn TranscodeRunner>,
    probe: Arc<dyn StreamProbe>,
    rng: Box<dyn RandomSource>,
    settings: BatchSettings,
    cancel: CancelFlag,
    spec: TransformSpec,
    events: mpsc::UnboundedSender<BatchEvent>,
}

impl BatchRun {
    async fn execute(mut self, files: Vec<PathBuf>) -> BatchSummary {
        let total = files.len();
        let format = self.spec.output_format.to_string();
        let mut summary = BatchSummary::new(total);

        info!(
            total,
            out_dir = %self.settings.out_dir.display(),
            format = %format,
            "Batch started"
        );

        for (index, input) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    attempted = summary.attempted,
                    total, "Batch cancelled before next file"
                );
                summary.cancelled = true;
                break;
            }

            let file_name = display_name(input);
            self.emit(BatchEvent::Processing {
                index,
                file_name: file_name.clone(),
            });

            let params = ParameterSampler::sample_job(&self.spec, self.rng.as_mut());
            let output = output_path_for(input, &self.settings.out_dir, self.spec.output_format);
            let job = Job::new(input, output, params).start();

            let logger = JobLogger::new(&job.id, &file_name, "transform");
            let span = logger.create_span();
            let result = self.run_job(&job, &logger).instrument(span).await;
            summary.attempted += 1;

            match result {
                Ok(()) => {
                    let job = job.succeed();
                    summary.succeeded += 1;
                    summary.outputs.push(job.output.clone());
                    metrics::record_job_succeeded(&format);
                    let elapsed_ms = job.elapsed().map_or(0, |d| d.num_milliseconds());
                    logger.log_completion(&format!(
                        "wrote {} in {} ms",
                        job.output.display(),
                        elapsed_ms
                    ));

                    self.emit(BatchEvent::Progress {
                        completed: summary.succeeded,
                        attempted: summary.attempted,
                        total,
                    });
                }
                Err(err) => {
                    let engine_missing = err.is_engine_missing();
                    let message = failure_message(&err, self.settings.error_tail_chars);
                    let job = job.fail(message.clone());
                    summary.failed += 1;
                    metrics::record_job_failed(&format);
                    logger.log_error(&format!("{} ({})", err, job.state));

                    self.emit(BatchEvent::Failed {
                        file_name,
                        input: input.clone(),
                        message,
                    });

                    if engine_missing {
                        error!("Engine is no longer available, aborting batch");
                        summary.aborted = Some(err.to_string());
                        break;
                    }
                }
            }
        }

        metrics::record_batch(summary.outcome());
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            attempted = summary.attempted,
            total,
            outcome = summary.outcome(),
            "Batch finished"
        );

        self.emit(BatchEvent::Completed(summary.clone()));
        summary
    }

    async fn run_job(&mut self, job: &Job, logger: &JobLogger) -> MediaResult<()> {
        logger.log_start(&format!(
            "zoom {}%, speed {}%",
            job.params.zoom_percent, job.params.speed_percent
        ));

        if !job.input.exists() {
            return Err(MediaError::FileNotFound(job.input.clone()));
        }

        let source = probe_source(self.probe.as_ref(), &self.spec, job).await;
        if !source.has_audio && !source.is_animated_loop && !self.spec.mute_audio {
            logger.log_warning("no audio stream, adding silent track");
        }
        let compiled = self.compiler.compile(
            &self.spec,
            &job.params,
            &source,
            &job.output,
            self.rng.as_mut(),
        );
        logger.log_progress("running engine");

        let started = Instant::now();
        let result = self.runner.run(&compiled.invocation).await;
        metrics::record_ffmpeg_duration(started.elapsed().as_secs_f64());
        result
    }

    fn emit(&self, event: BatchEvent) {
        if self.events.send(event).is_err() {
            debug!("Batch event receiver dropped");
        }
    }
}

/// Stream facts the compiler needs for one input. The audio probe is
/// skipped when its answer cannot change the graph.
async fn probe_source(probe: &dyn StreamProbe, spec: &TransformSpec, job: &Job) -> SourceInfo {
    let source = SourceInfo::from_path(&job.input);
    if spec.mute_audio || source.is_animated_loop {
        return source;
    }
    let has_audio = probe.has_audio(&job.input).await;
    source.with_audio(has_audio)
}

/// Failure text for an event: the error plus the trailing part of the
/// engine diagnostics, at most `max_chars` characters of diagnostics.
fn failure_message(err: &MediaError, max_chars: usize) -> String {
    let text = err.diagnostic_text();
    tail_chars(&text, max_chars)
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

/// Remove a scratch directory, logging instead of failing.
pub async fn remove_scratch_dir(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed scratch directory"),
        Err(e) => warn!(dir = %dir.display(), "Failed to remove scratch directory: {}", e),
    }
}
