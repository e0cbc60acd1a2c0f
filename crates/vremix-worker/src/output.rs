//! Output file naming.

use std::path::{Path, PathBuf};
use vremix_models::OutputFormat;

/// Container extension for every output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Suffix added when the regular output name would overwrite the input.
const COLLISION_SUFFIX: &str = "_output";

/// `<out_dir>/<stem><suffix>.mp4`, or `<stem><suffix>_output.mp4` if that
/// would resolve to the input itself.
pub fn output_path_for(input: &Path, out_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let suffix = format.output_suffix();

    let candidate = out_dir.join(format!("{}{}.{}", stem, suffix, OUTPUT_EXTENSION));
    if same_file(&candidate, input) {
        out_dir.join(format!(
            "{}{}{}.{}",
            stem, suffix, COLLISION_SUFFIX, OUTPUT_EXTENSION
        ))
    } else {
        candidate
    }
}

/// Whether two paths name the same file, following symlinks when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => match (std::path::absolute(a), std::path::absolute(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
    }
}
