//! Batch remix command line.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};

use vremix_media::{FilterGraphCompiler, StdRandom};
use vremix_models::{FormatPreset, OutputFormat, TransformSpec};
use vremix_worker::{
    init_tracing, remove_scratch_dir, split_inputs, BatchEvent, BatchOrchestrator, BatchSettings,
    WorkerConfig,
};

/// Scratch directory for pre-split chunks, inside the output directory.
const SCRATCH_DIR: &str = "temp";

#[derive(Debug, Parser)]
#[command(name = "vremix", version, about = "Apply randomized transforms to a batch of videos")]
struct Cli {
    /// Transform spec (JSON). Defaults to an identity transform.
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    out_dir: PathBuf,

    /// Output format: `original`, a preset name such as `reels`, or `WxH`
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Fill canvas bars with a blurred copy of the video
    #[arg(long)]
    blur: bool,

    /// Drop all audio from the outputs
    #[arg(long)]
    mute: bool,

    /// Split every input into chunks of this many seconds first
    #[arg(long, value_name = "SECS")]
    split_secs: Option<u32>,

    /// Seed for reproducible parameter draws
    #[arg(long)]
    seed: Option<u64>,

    /// Print format presets, filters and overlay anchors, then exit
    #[arg(long)]
    list: bool,

    /// Input files
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    let compiler = config.build_compiler()?;

    if cli.list {
        print_catalogs(&compiler);
        return Ok(());
    }

    if cli.files.is_empty() {
        bail!("no input files given");
    }

    let spec = load_spec(&cli).await?;
    let runner = config.build_runner();
    let probe = config.build_probe();

    let scratch = cli.out_dir.join(SCRATCH_DIR);
    let files = match cli.split_secs {
        Some(secs) => {
            let parts = split_inputs(runner.as_ref(), &cli.files, &scratch, secs).await;
            if parts.is_empty() {
                remove_scratch_dir(&scratch).await;
                bail!("splitting produced no chunks");
            }
            parts
        }
        None => cli.files.clone(),
    };

    info!(
        files = files.len(),
        out_dir = %cli.out_dir.display(),
        format = %spec.output_format,
        "Starting vremix"
    );

    let settings =
        BatchSettings::new(&cli.out_dir).with_error_tail_chars(config.error_tail_chars);
    let mut orchestrator = BatchOrchestrator::new(compiler, runner, probe, settings);
    if let Some(seed) = cli.seed {
        orchestrator = orchestrator.with_random(Box::new(StdRandom::seeded(seed)));
    }

    let mut handle = orchestrator.start(spec, files).await?;

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current file");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        report(&event);
    }
    let summary = handle.wait().await?;

    if cli.split_secs.is_some() {
        remove_scratch_dir(&scratch).await;
    }

    if let Some(reason) = &summary.aborted {
        bail!("batch aborted: {}", reason);
    }
    if summary.failed > 0 {
        bail!("{} of {} files failed", summary.failed, summary.attempted);
    }
    Ok(())
}

async fn load_spec(cli: &Cli) -> anyhow::Result<TransformSpec> {
    let mut spec = match &cli.spec {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading transform spec {}", path.display()))?;
            TransformSpec::from_json(&json)
                .with_context(|| format!("parsing transform spec {}", path.display()))?
        }
        None => TransformSpec::default(),
    };

    if let Some(format) = cli.format {
        spec = spec.with_output_format(format);
    }
    if cli.blur {
        spec.output_format = spec.output_format.with_blur(true);
    }
    if cli.mute {
        spec = spec.muted();
    }
    Ok(spec)
}

fn report(event: &BatchEvent) {
    match event {
        BatchEvent::Processing { index, file_name } => {
            info!("[{}] Processing {}", index + 1, file_name);
        }
        BatchEvent::Progress {
            completed,
            attempted,
            total,
        } => {
            info!(completed, attempted, total, "Progress {}/{}", completed, total);
        }
        BatchEvent::Failed {
            file_name, message, ..
        } => {
            error!(file = %file_name, "Failed: {}", message);
        }
        BatchEvent::Completed(summary) => {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                outcome = summary.outcome(),
                "Done: {} of {} files written",
                summary.succeeded,
                summary.total
            );
        }
    }
}

fn print_catalogs(compiler: &FilterGraphCompiler) {
    println!("Formats:");
    println!("  {:<22} keep source size", OutputFormat::Original.to_string());
    for preset in FormatPreset::ALL {
        println!(
            "  {:<22} {}x{} ({})",
            preset.key, preset.width, preset.height, preset.label
        );
    }

    println!("Filters:");
    for name in compiler.catalog().names() {
        println!("  {}", name);
    }

    println!("Overlay anchors:");
    for name in compiler.anchors().names() {
        println!("  {}", name);
    }
}
