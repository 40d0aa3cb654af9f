//! FFprobe video information.

use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

use vstyle_models::{ColorMetadata, VideoMetadata};

use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    color_space: Option<String>,
    color_transfer: Option<String>,
    color_primaries: Option<String>,
    color_range: Option<String>,
}

/// Probe a video file for metadata.
pub fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Build metadata from ffprobe's JSON.
fn parse_probe_output(json: &[u8]) -> MediaResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(
            "Video stream has no dimensions".to_string(),
        ));
    }

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let total_frames = video_stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        duration,
        total_frames,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        color: ColorMetadata {
            color_space: video_stream.color_space.clone(),
            color_transfer: video_stream.color_transfer.clone(),
            color_primaries: video_stream.color_primaries.clone(),
            color_range: video_stream.color_range.clone(),
        },
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|v: &f64| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_with_nb_frames() {
        let json = br#"{
            "format": {"duration": "10.000000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
                 "avg_frame_rate": "30/1", "nb_frames": "300",
                 "color_space": "bt709", "color_range": "tv"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.total_frames, 300);
        assert_eq!((meta.width, meta.height), (1280, 720));
        assert!(meta.has_audio);
        assert_eq!(meta.color.color_space.as_deref(), Some("bt709"));
    }

    #[test]
    fn test_parse_probe_output_estimates_frames() {
        let json = br#"{
            "format": {"duration": "4.0"},
            "streams": [{"codec_type": "video", "width": 64, "height": 64, "r_frame_rate": "25/1"}]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.total_frames, 100);
        assert!(!meta.has_audio);
    }

    #[test]
    fn test_parse_probe_output_without_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}]}"#;
        let err = parse_probe_output(json).unwrap_err();
        assert!(err.is_probe_error());
    }
}
