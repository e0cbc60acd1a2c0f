//! FFmpeg command builder and runner.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Default number of engine diagnostic lines kept for error reports.
pub const DEFAULT_DIAGNOSTIC_LINES: usize = 15;

/// Default engine log level.
pub const DEFAULT_LOG_LEVEL: &str = "warning";

/// One input of an FFmpeg command with the arguments that precede its `-i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInput {
    pub args: Vec<String>,
    pub source: String,
}

/// Builder for multi-input FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Output file path
    output: PathBuf,
    /// Inputs in `-i` order
    inputs: Vec<CommandInput>,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
            inputs: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add an input with no per-input options.
    pub fn input(mut self, source: impl AsRef<Path>) -> Self {
        self.inputs.push(CommandInput {
            args: Vec::new(),
            source: source.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add an input preceded by per-input options (e.g. `-stream_loop -1`).
    pub fn input_with<I, S>(mut self, source: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(CommandInput {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    /// Add a lavfi virtual input (e.g. `anullsrc=...`).
    pub fn lavfi_input(self, graph: impl Into<String>) -> Self {
        self.input_with(graph, ["-f", "lavfi"])
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or graph label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Finish the command as an invocation about `subject`.
    pub fn into_invocation(self, subject: impl Into<PathBuf>) -> Invocation {
        Invocation {
            args: self.build_args(),
            subject: subject.into(),
        }
    }
}

/// A fully assembled engine invocation (arguments only, without the program).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    /// The input file this invocation works on, for diagnostics
    pub subject: PathBuf,
}

impl Invocation {
    /// Argument following the first occurrence of `flag`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Whether `flag` appears anywhere in the arguments.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Output path (always the last argument).
    pub fn output(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Executes engine invocations.
#[async_trait]
pub trait TranscodeRunner: Send + Sync {
    /// Resolve the engine executable, failing with `FfmpegNotFound` if absent.
    fn check_available(&self) -> MediaResult<PathBuf>;

    /// Run one invocation to completion.
    async fn run(&self, invocation: &Invocation) -> MediaResult<()>;
}

/// Bounded buffer holding the most recent diagnostic lines.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest once full. Blank lines are ignored.
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if line.trim().is_empty() || self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined with newlines, oldest first.
    pub fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Runs FFmpeg as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Explicitly configured executable
    configured: Option<PathBuf>,
    /// Program name looked up on PATH
    program: String,
    /// Engine log level
    log_level: String,
    /// Diagnostic lines retained for failures
    diagnostic_lines: usize,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl FfmpegRunner {
    /// Create a runner. `configured` wins over PATH when it exists.
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            program: "ffmpeg".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            diagnostic_lines: DEFAULT_DIAGNOSTIC_LINES,
        }
    }

    /// Override the program name searched on PATH.
    pub fn with_program_name(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set how many diagnostic lines are kept.
    pub fn with_diagnostic_lines(mut self, lines: usize) -> Self {
        self.diagnostic_lines = lines;
        self
    }

    /// Set the engine log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[async_trait]
impl TranscodeRunner for FfmpegRunner {
    fn check_available(&self) -> MediaResult<PathBuf> {
        resolve_binary(self.configured.as_deref(), &self.program).ok_or(MediaError::FfmpegNotFound)
    }

    async fn run(&self, invocation: &Invocation) -> MediaResult<()> {
        let binary = self.check_available()?;
        let subject = crate::display_name(&invocation.subject);

        debug!(
            file = %subject,
            "Running FFmpeg: {} {}",
            binary.display(),
            invocation.args.join(" ")
        );

        let spawned = Command::new(&binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg(&self.log_level)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FfmpegNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;

        let capacity = self.diagnostic_lines;
        let log_subject = subject.clone();
        let reader = tokio::spawn(async move {
            collect_diagnostics(BufReader::new(stderr), capacity, &log_subject).await
        });

        let status = child.wait().await?;
        let tail = match reader.await {
            Ok(tail) => tail,
            Err(e) => {
                warn!(file = %subject, "FFmpeg stderr reader failed: {}", e);
                DiagnosticTail::default()
            }
        };

        if status.success() {
            Ok(())
        } else {
            let code = status.code();
            let message = match code {
                Some(code) => format!("FFmpeg exited with status {}", code),
                None => "FFmpeg terminated by signal".to_string(),
            };
            Err(MediaError::ffmpeg_failed(message, Some(tail.joined()), code))
        }
    }
}

/// Drain engine diagnostics until EOF, keeping the last lines.
///
/// Lines are decoded lossily; file names and metadata may carry bytes that
/// are not UTF-8, and the pipe must stay open until the engine exits.
async fn collect_diagnostics<R>(mut reader: R, capacity: usize, subject: &str) -> DiagnosticTail
where
    R: AsyncBufRead + Unpin,
{
    let mut tail = DiagnosticTail::new(capacity);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                debug!(file = %subject, "ffmpeg: {}", line);
                tail.push(line);
            }
            Err(e) => {
                warn!(file = %subject, "Failed reading FFmpeg diagnostics: {}", e);
                break;
            }
        }
    }
    tail
}

/// Resolve an executable: the configured path if it exists (or resolves via
/// PATH), otherwise `program` on PATH.
pub fn resolve_binary(configured: Option<&Path>, program: &str) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if let Ok(found) = which::which(path) {
            return Some(found);
        }
        debug!(path = %path.display(), "Configured executable not found, falling back to PATH");
    }
    which::which(program).ok()
}

/// Path of a sibling tool next to `binary` (e.g. ffprobe beside ffmpeg).
pub fn sibling_binary(binary: &Path, program: &str) -> Option<PathBuf> {
    let candidate = binary
        .parent()?
        .join(format!("{}{}", program, std::env::consts::EXE_SUFFIX));
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let inv = FfmpegCommand::new("out.mp4")
            .input_with("in.gif", ["-stream_loop", "-1"])
            .lavfi_input("anullsrc=channel_layout=stereo:sample_rate=44100")
            .filter_complex("[0:v]null[vout]")
            .map("[vout]")
            .duration(10.0)
            .into_invocation("in.gif");

        assert_eq!(
            inv.args,
            vec![
                "-y",
                "-stream_loop",
                "-1",
                "-i",
                "in.gif",
                "-f",
                "lavfi",
                "-i",
                "anullsrc=channel_layout=stereo:sample_rate=44100",
                "-filter_complex",
                "[0:v]null[vout]",
                "-map",
                "[vout]",
                "-t",
                "10.000",
                "out.mp4",
            ]
        );
        assert_eq!(inv.arg_after("-map"), Some("[vout]"));
        assert_eq!(inv.output(), Some("out.mp4"));
        assert!(!inv.has_arg("-an"));
    }

    #[test]
    fn test_diagnostic_tail_is_bounded() {
        let mut tail = DiagnosticTail::new(3);
        for i in 0..10 {
            tail.push(format!("line {}", i));
        }
        tail.push("   ");

        assert_eq!(tail.len(), 3);
        assert_eq!(tail.joined(), "line 7\nline 8\nline 9");
    }

    #[test]
    fn test_resolve_configured_binary() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("my-ffmpeg");
        std::fs::write(&engine, b"").unwrap();

        let resolved = resolve_binary(Some(&engine), "vremix-no-such-program");
        assert_eq!(resolved, Some(engine));
    }

    #[test]
    fn test_resolve_missing_binary() {
        let resolved = resolve_binary(
            Some(Path::new("/nonexistent/vremix/ffmpeg")),
            "vremix-no-such-program",
        );
        assert!(resolved.is_none());
    }

    #[test]
    fn test_sibling_binary() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let probe = dir
            .path()
            .join(format!("ffprobe{}", std::env::consts::EXE_SUFFIX));
        std::fs::write(&probe, b"").unwrap();

        assert_eq!(sibling_binary(&ffmpeg, "ffprobe"), Some(probe));
        assert_eq!(sibling_binary(&ffmpeg, "ffplay"), None);
    }

    #[tokio::test]
    async fn test_diagnostics_survive_invalid_utf8() {
        let stderr: &[u8] = b"first line\nbad \xff\xfe bytes\r\nError opening output: real cause\n";
        let tail = collect_diagnostics(stderr, 15, "clip.mp4").await;

        assert_eq!(tail.len(), 3);
        let joined = tail.joined();
        assert!(joined.starts_with("first line\nbad "));
        assert!(joined.contains('\u{FFFD}'));
        assert!(joined.ends_with("Error opening output: real cause"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_keeps_diagnostics_after_invalid_utf8() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");
        std::fs::write(
            &engine,
            "#!/bin/sh\n\
             printf 'first line\\n' >&2\n\
             printf 'bad \\377\\376 bytes\\n' >&2\n\
             printf 'Error opening output: real cause\\n' >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = FfmpegRunner::new(Some(engine));
        let inv = FfmpegCommand::new("out.mp4").input("in.mp4").into_invocation("in.mp4");

        match runner.run(&inv).await {
            Err(MediaError::FfmpegFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(1));
                let stderr = stderr.unwrap_or_default();
                assert!(stderr.starts_with("first line"));
                assert!(stderr.ends_with("Error opening output: real cause"));
            }
            other => panic!("expected engine failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runner_reports_missing_engine() {
        let runner = FfmpegRunner::new(Some(PathBuf::from("/nonexistent/vremix/ffmpeg")))
            .with_program_name("vremix-no-such-program");

        assert!(matches!(
            runner.check_available(),
            Err(MediaError::FfmpegNotFound)
        ));

        let inv = FfmpegCommand::new("out.mp4").input("in.mp4").into_invocation("in.mp4");
        assert!(matches!(
            runner.run(&inv).await,
            Err(MediaError::FfmpegNotFound)
        ));
    }
}
