//! FFmpeg-backed frame sources and sinks.
//!
//! Frames travel as raw RGB24 over subprocess pipes: one decoder process per
//! opened stream, one encoder process per sink.

use image::RgbImage;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, ChildStdout, Stdio};
use tracing::{debug, warn};

use vstyle_models::{EncodingSettings, VideoMetadata};

use crate::capabilities;
use crate::command::{non_empty, FfmpegCommand, FfmpegProcess};
use crate::concat::concat_chunks;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameSink, FrameSource, FrameStream, MediaBackend, SinkSettings};
use crate::probe::probe_video;

/// [`MediaBackend`] driving the local ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    fn source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::new(input)))
    }

    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegFrameSink::open(path, settings)?))
    }

    fn stitch(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()> {
        concat_chunks(parts, output)
    }

    fn resolve_encoding(&self, settings: EncodingSettings) -> EncodingSettings {
        capabilities::resolve_encoding(settings)
    }
}

/// Decodes an input file through `ffmpeg -f rawvideo`.
pub struct FfmpegFrameSource {
    path: PathBuf,
    metadata: std::sync::OnceLock<VideoMetadata>,
}

impl FfmpegFrameSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            metadata: std::sync::OnceLock::new(),
        }
    }

    fn metadata(&self) -> MediaResult<VideoMetadata> {
        if let Some(meta) = self.metadata.get() {
            return Ok(meta.clone());
        }
        let meta = probe_video(&self.path)?;
        Ok(self.metadata.get_or_init(|| meta).clone())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn probe(&self) -> MediaResult<VideoMetadata> {
        self.metadata()
    }

    fn open(&self, start_frame: u64) -> MediaResult<FrameStream> {
        let meta = self.metadata()?;
        let mut cmd = FfmpegCommand::new(&self.path, "-");
        if start_frame > 0 {
            cmd = cmd.seek(meta.frame_to_seconds(start_frame));
        }
        let cmd = cmd.video_only().raw_rgb_output();

        let mut process = FfmpegProcess::spawn(&cmd, Stdio::null(), Stdio::piped(), false)?;
        let stdout = process
            .child_mut()
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("decoder stdout not captured"))?;

        debug!(
            "Opened decoder for {} at frame {}",
            self.path.display(),
            start_frame
        );

        Ok(Box::new(FfmpegFrameReader {
            process: Some(process),
            stdout,
            width: meta.width,
            height: meta.height,
            done: false,
        }))
    }
}

/// Iterator over frames read from a decoder's stdout.
struct FfmpegFrameReader {
    process: Option<FfmpegProcess>,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    done: bool,
}

impl FfmpegFrameReader {
    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Reap the decoder; a non-zero exit becomes an error.
    fn finish(&mut self) -> MediaResult<()> {
        let Some(process) = self.process.take() else {
            return Ok(());
        };
        let (status, stderr) = process.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("decoder exited with {}", status),
                non_empty(stderr),
                status.code(),
            ))
        }
    }
}

impl Iterator for FfmpegFrameReader {
    type Item = MediaResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let expected = self.frame_bytes();
        let mut buf = vec![0u8; expected];
        match read_full(&mut self.stdout, &mut buf) {
            Ok(n) if n == expected => RgbImage::from_raw(self.width, self.height, buf)
                .map(Ok)
                .or_else(|| Some(Err(MediaError::internal("frame buffer size mismatch")))),
            Ok(0) => {
                self.done = true;
                self.finish().err().map(Err)
            }
            Ok(n) => {
                self.done = true;
                let stderr = self.process.take().map(FfmpegProcess::kill);
                Some(Err(MediaError::ffmpeg_failed(
                    format!("truncated frame: {} of {} bytes", n, expected),
                    stderr.and_then(non_empty),
                    None,
                )))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        // Streams are usually abandoned mid-file at chunk boundaries.
        if let Some(process) = self.process.take() {
            process.kill();
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encodes frames written to an ffmpeg process's stdin.
pub struct FfmpegFrameSink {
    process: Option<FfmpegProcess>,
    stdin: Option<ChildStdin>,
    settings: SinkSettings,
    path: PathBuf,
    frames_written: u64,
}

impl FfmpegFrameSink {
    /// Start an encoder targeting `path`.
    pub fn open(path: &Path, settings: &SinkSettings) -> MediaResult<Self> {
        if settings.width == 0 || settings.height == 0 || settings.fps <= 0.0 {
            return Err(MediaError::invalid_argument(format!(
                "cannot encode {}x{} at {} fps",
                settings.width, settings.height, settings.fps
            )));
        }

        let cmd = FfmpegCommand::new("-", path)
            .raw_rgb_input(settings.width, settings.height, settings.fps)
            .encoding(&settings.encoding)
            .color(&settings.color);

        let mut process = FfmpegProcess::spawn(&cmd, Stdio::piped(), Stdio::null(), true)?;
        let stdin = process
            .child_mut()
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("encoder stdin not captured"))?;

        Ok(Self {
            process: Some(process),
            stdin: Some(stdin),
            settings: settings.clone(),
            path: path.to_path_buf(),
            frames_written: 0,
        })
    }

    fn abort(&mut self, message: String) -> MediaError {
        drop(self.stdin.take());
        let stderr = self.process.take().map(FfmpegProcess::kill);
        MediaError::encode_failed(message, stderr.and_then(non_empty))
    }
}

impl FrameSink for FfmpegFrameSink {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        self.settings.check_frame(frame)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MediaError::encode_failed("encoder already closed", None));
        };
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.abort(format!(
                "writing frame {} to {}: {}",
                self.frames_written,
                self.path.display(),
                e
            )));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> MediaResult<()> {
        drop(self.stdin.take());
        let Some(process) = self.process.take() else {
            return Err(MediaError::encode_failed("encoder already closed", None));
        };
        let (status, stderr) = process.wait()?;
        if !status.success() {
            return Err(MediaError::encode_failed(
                format!("encoder for {} exited with {}", self.path.display(), status),
                non_empty(stderr),
            ));
        }
        if !self.path.exists() {
            return Err(MediaError::encode_failed(
                format!("encoder produced no file at {}", self.path.display()),
                non_empty(stderr),
            ));
        }
        debug!(
            "Encoded {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for FfmpegFrameSink {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            warn!("Encoder for {} dropped without close", self.path.display());
            drop(self.stdin.take());
            process.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_full_short_input() {
        let mut reader = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 5];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_sink_rejects_zero_size() {
        let settings = SinkSettings {
            width: 0,
            height: 0,
            fps: 30.0,
            encoding: EncodingSettings::default(),
            color: Default::default(),
        };
        let err = FfmpegFrameSink::open(Path::new("/tmp/never.mp4"), &settings)
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }
}
