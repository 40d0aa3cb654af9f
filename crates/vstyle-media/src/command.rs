//! FFmpeg command builder and process helpers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use tracing::debug;

use vstyle_models::{ColorMetadata, EncodingSettings};

use crate::error::{MediaError, MediaResult};

/// Stderr is truncated to this many trailing bytes in error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path ("-" for stdin)
    input: PathBuf,
    /// Output file path ("-" for stdout)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
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

    /// Set seek position (before input, frame accurate when decoding).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.6}", seconds))
    }

    /// Describe a raw RGB24 frame stream arriving on the input.
    pub fn raw_rgb_input(self, width: u32, height: u32, fps: f64) -> Self {
        self.input_arg("-f")
            .input_arg("rawvideo")
            .input_arg("-pix_fmt")
            .input_arg("rgb24")
            .input_arg("-s")
            .input_arg(format!("{}x{}", width, height))
            .input_arg("-r")
            .input_arg(format!("{}", fps))
    }

    /// Emit raw RGB24 frames on the output.
    pub fn raw_rgb_output(self) -> Self {
        self.output_arg("-f")
            .output_arg("rawvideo")
            .output_arg("-pix_fmt")
            .output_arg("rgb24")
    }

    /// Drop audio, subtitle and data streams.
    pub fn video_only(self) -> Self {
        self.output_arg("-an").output_arg("-sn").output_arg("-dn")
    }

    /// Apply encoder settings.
    pub fn encoding(self, settings: &EncodingSettings) -> Self {
        self.output_args(settings.to_ffmpeg_args())
    }

    /// Tag the output with color metadata.
    pub fn color(self, color: &ColorMetadata) -> Self {
        self.output_args(color.to_ffmpeg_args())
    }

    /// Copy streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// A spawned FFmpeg process whose stderr is drained on a helper thread.
pub struct FfmpegProcess {
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawn `cmd` with the given stdin/stdout wiring.
    ///
    /// `-nostdin` is dropped from the arguments when stdin carries frames.
    pub fn spawn(cmd: &FfmpegCommand, stdin: Stdio, stdout: Stdio, reads_stdin: bool) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut args = cmd.build_args();
        if reads_stdin {
            args.retain(|a| a != "-nostdin");
        }
        debug!("Spawning ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        Ok(Self { child, stderr })
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait for exit and collect stderr.
    pub fn wait(mut self) -> MediaResult<(ExitStatus, String)> {
        // Close our end of stdin so the process sees EOF.
        drop(self.child.stdin.take());
        let status = self.child.wait()?;
        let stderr = self.collect_stderr();
        Ok((status, stderr))
    }

    /// Kill the process and reap it.
    pub fn kill(mut self) -> String {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.collect_stderr()
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|s| tail(&s))
            .unwrap_or_default()
    }
}

/// Run an FFmpeg command to completion.
pub fn run_ffmpeg(cmd: &FfmpegCommand) -> MediaResult<()> {
    let process = FfmpegProcess::spawn(cmd, Stdio::null(), Stdio::null(), false)?;
    let (status, stderr) = process.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg exited with {}", status),
            non_empty(stderr),
            status.code(),
        ))
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn tail(s: &str) -> String {
    if s.len() <= STDERR_TAIL_BYTES {
        return s.trim().to_string();
    }
    let mut start = s.len() - STDERR_TAIL_BYTES;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].trim().to_string()
}
