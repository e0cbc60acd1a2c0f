//! Pre-splitting inputs into fixed-duration chunks.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, TranscodeRunner};
use crate::error::{MediaError, MediaResult};

/// Marker between the source stem and the part number.
const PART_MARKER: &str = "_part_";

/// Split `input` into `secs`-long stream-copied chunks inside `out_dir`.
///
/// Returns the chunk paths sorted by name. Parts left in `out_dir` by an
/// earlier split of the same stem are removed first, so only parts written
/// by this call are returned. Producing no chunks is an error.
pub async fn split_into_chunks(
    runner: &dyn TranscodeRunner,
    input: &Path,
    out_dir: &Path,
    secs: u32,
) -> MediaResult<Vec<PathBuf>> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let prefix = format!("{}{}", stem, PART_MARKER);
    let pattern = out_dir.join(format!("{}%03d.mp4", prefix));

    for stale in list_parts(out_dir, &prefix).await? {
        debug!(part = %stale.display(), "Removing stale chunk");
        tokio::fs::remove_file(&stale).await?;
    }

    let invocation = FfmpegCommand::new(&pattern)
        .input(input)
        .output_args(["-c", "copy", "-f", "segment", "-segment_time"])
        .output_arg(secs.max(1).to_string())
        .output_args(["-reset_timestamps", "1"])
        .into_invocation(input);

    runner.run(&invocation).await?;

    let parts = list_parts(out_dir, &prefix).await?;
    if parts.is_empty() {
        return Err(MediaError::NoChunks(input.to_path_buf()));
    }

    info!(
        file = %input.display(),
        parts = parts.len(),
        "Split input into chunks"
    );
    Ok(parts)
}

async fn list_parts(dir: &Path, prefix: &str) -> MediaResult<Vec<PathBuf>> {
    let mut parts = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".mp4") {
            parts.push(entry.path());
        }
    }
    parts.sort();
    Ok(parts)
}
