//! Lossless concatenation of encoded chunks.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{run_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// Concatenate `parts` in order into `output` with stream copy.
///
/// The parts are left in place; callers delete them after success so a
/// failed stitch can be retried.
pub fn concat_chunks(parts: &[PathBuf], output: &Path) -> MediaResult<()> {
    if parts.is_empty() {
        return Err(MediaError::stitch_failed("no chunks to stitch", 0, None));
    }

    for part in parts {
        if !part.exists() {
            return Err(MediaError::stitch_failed(
                format!("chunk {} is missing", part.display()),
                parts.len(),
                None,
            ));
        }
    }

    let list_path = list_path_for(output);
    fs::write(&list_path, build_concat_list(parts)?)?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .stream_copy();

    let result = run_ffmpeg(&cmd);

    if let Err(e) = fs::remove_file(&list_path) {
        warn!("Failed to remove concat list {}: {}", list_path.display(), e);
    }

    match result {
        Ok(()) => {
            info!("Stitched {} chunks into {}", parts.len(), output.display());
            Ok(())
        }
        Err(e) => {
            let stderr = e.stderr().map(str::to_string);
            Err(MediaError::stitch_failed(e.to_string(), parts.len(), stderr))
        }
    }
}

fn list_path_for(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".concat.txt");
    output.with_file_name(name)
}

/// Concat demuxer list with absolute, quoted paths.
fn build_concat_list(parts: &[PathBuf]) -> MediaResult<String> {
    let mut list = String::new();
    for part in parts {
        let abs = part.canonicalize()?;
        let escaped = abs.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(list)
}
