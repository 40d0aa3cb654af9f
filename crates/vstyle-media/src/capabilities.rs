//! Encoder capability detection.

use std::collections::HashSet;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::{info, warn};

use vstyle_models::EncodingSettings;

static ENCODERS: OnceLock<HashSet<String>> = OnceLock::new();

/// Video encoders compiled into the local ffmpeg (queried once per process).
pub fn available_encoders() -> &'static HashSet<String> {
    ENCODERS.get_or_init(|| match query_encoders() {
        Ok(set) => {
            info!("Detected {} ffmpeg encoders", set.len());
            set
        }
        Err(e) => {
            warn!("Could not list ffmpeg encoders: {}", e);
            HashSet::new()
        }
    })
}

fn query_encoders() -> std::io::Result<HashSet<String>> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `ffmpeg -encoders` output into encoder names.
///
/// Lines look like ` V....D h264_nvenc           NVIDIA NVENC H.264 encoder`.
fn parse_encoder_list(text: &str) -> HashSet<String> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            let is_flag_column = flags.len() == 6
                && flags.chars().all(|c| c == '.' || c.is_ascii_alphabetic());
            (is_flag_column && flags.starts_with('V') && name != "=").then(|| name.to_string())
        })
        .collect()
}

/// Swap a hardware codec for the software fallback when it is missing.
pub fn resolve_encoding_with(
    settings: EncodingSettings,
    encoders: &HashSet<String>,
) -> EncodingSettings {
    if settings.is_nvenc() && !encoders.contains(&settings.codec) {
        warn!(
            "Encoder {} unavailable, falling back to software encoding",
            settings.codec
        );
        return settings.with_software_fallback();
    }
    settings
}

/// Resolve settings against the local ffmpeg build.
pub fn resolve_encoding(settings: EncodingSettings) -> EncodingSettings {
    resolve_encoding_with(settings, available_encoders())
}
