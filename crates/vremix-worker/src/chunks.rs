//! Pre-splitting a batch of inputs into chunks.

use std::path::{Path, PathBuf};
use tracing::error;

use vremix_media::{split_into_chunks, TranscodeRunner};

/// Split every input into `secs`-long chunks under `scratch`.
///
/// Each input gets its own `scratch/<index>/` directory, so inputs sharing a
/// file stem never overwrite each other's parts. An input that cannot be
/// split is logged and skipped; the caller decides what an empty result means.
pub async fn split_inputs(
    runner: &dyn TranscodeRunner,
    inputs: &[PathBuf],
    scratch: &Path,
    secs: u32,
) -> Vec<PathBuf> {
    let mut parts = Vec::new();
    for (index, input) in inputs.iter().enumerate() {
        let dir = scratch.join(format!("{:03}", index));
        match split_into_chunks(runner, input, &dir, secs).await {
            Ok(mut chunks) => parts.append(&mut chunks),
            Err(e) => error!(file = %input.display(), "Failed to split: {}", e),
        }
    }
    parts
}
