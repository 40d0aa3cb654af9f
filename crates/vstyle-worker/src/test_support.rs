//! In-memory media fakes for pipeline and processor tests.
//!
//! Frames carry their index in the first pixel. Sinks write one index per
//! line, and stitching concatenates those logs, so a finished output can be
//! read back as the exact frame sequence that reached it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use vstyle_media::{
    Frame, FrameSink, FrameSource, FrameStream, MediaBackend, MediaError, MediaResult,
    SinkSettings,
};
use vstyle_models::{ColorMetadata, EncodingSettings, VideoMetadata};

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

fn frame_for(index: u64) -> Frame {
    let mut frame = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([128, 128, 128]));
    frame.put_pixel(
        0,
        0,
        Rgb([
            (index >> 16) as u8,
            (index >> 8) as u8,
            index as u8,
        ]),
    );
    frame
}

fn index_of(frame: &Frame) -> u64 {
    let p = frame.get_pixel(0, 0);
    ((p[0] as u64) << 16) | ((p[1] as u64) << 8) | p[2] as u64
}

/// Frame indices recorded in a finished output.
pub fn read_frame_log(path: &Path) -> Vec<u64> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.parse().unwrap())
        .collect()
}

#[derive(Clone)]
pub struct FakeSource {
    metadata: VideoMetadata,
    available: Arc<AtomicUsize>,
    probe_fails: Arc<AtomicBool>,
    opened: Arc<Mutex<Vec<u64>>>,
}

impl FakeSource {
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            metadata: VideoMetadata {
                width: WIDTH,
                height: HEIGHT,
                fps,
                duration: total_frames as f64 / fps,
                total_frames,
                codec: "h264".to_string(),
                color: ColorMetadata::default(),
                has_audio: false,
            },
            available: Arc::new(AtomicUsize::new(total_frames as usize)),
            probe_fails: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Decode stops after `frames` although the probe reports more.
    pub fn truncate_at(&self, frames: u64) {
        self.available.store(frames as usize, Ordering::SeqCst);
    }

    pub fn fail_probe(&self) {
        self.probe_fails.store(true, Ordering::SeqCst);
    }

    /// Start frames of every `open` call, in order.
    pub fn opened_at(&self) -> Vec<u64> {
        self.opened.lock().unwrap().clone()
    }
}

impl FrameSource for FakeSource {
    fn probe(&self) -> MediaResult<VideoMetadata> {
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(MediaError::InvalidVideo("no video stream".to_string()));
        }
        Ok(self.metadata.clone())
    }

    fn open(&self, start_frame: u64) -> MediaResult<FrameStream> {
        self.opened.lock().unwrap().push(start_frame);
        let end = self.available.load(Ordering::SeqCst) as u64;
        Ok(Box::new((start_frame..end).map(|i| Ok(frame_for(i)))))
    }
}

struct FakeSink {
    path: PathBuf,
    settings: SinkSettings,
    frames: Vec<u64>,
    fail_close: bool,
}

impl FrameSink for FakeSink {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        self.settings.check_frame(frame)?;
        self.frames.push(index_of(frame));
        Ok(())
    }

    fn close(self: Box<Self>) -> MediaResult<()> {
        if self.fail_close {
            return Err(MediaError::encode_failed(
                "encoder exited with status 1",
                Some("Conversion failed!".to_string()),
            ));
        }
        let body: String = self.frames.iter().map(|i| format!("{}\n", i)).collect();
        fs::write(&self.path, body)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBackend {
    source: Mutex<Option<FakeSource>>,
    sinks_opened: AtomicUsize,
    fail_sink_at: Mutex<Option<usize>>,
    stitch_fails: AtomicBool,
    stitch_calls: AtomicUsize,
    software_only: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose `source()` hands out clones of `source`.
    pub fn with_source(source: FakeSource) -> Self {
        let backend = Self::default();
        *backend.source.lock().unwrap() = Some(source);
        backend
    }

    /// The sink with this 0-based open index fails on close.
    pub fn fail_sink_close_at(&self, index: usize) {
        *self.fail_sink_at.lock().unwrap() = Some(index);
    }

    pub fn fail_stitch(&self, fail: bool) {
        self.stitch_fails.store(fail, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        *self.fail_sink_at.lock().unwrap() = None;
        self.fail_stitch(false);
    }

    /// Pretend no hardware encoder exists.
    pub fn force_software_encoding(&self) {
        self.software_only.store(true, Ordering::SeqCst);
    }

    pub fn sinks_opened(&self) -> usize {
        self.sinks_opened.load(Ordering::SeqCst)
    }

    pub fn stitch_calls(&self) -> usize {
        self.stitch_calls.load(Ordering::SeqCst)
    }
}

impl MediaBackend for FakeBackend {
    fn source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>> {
        match self.source.lock().unwrap().clone() {
            Some(source) => Ok(Box::new(source)),
            None => Err(MediaError::FileNotFound(input.to_path_buf())),
        }
    }

    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> MediaResult<Box<dyn FrameSink>> {
        let index = self.sinks_opened.fetch_add(1, Ordering::SeqCst);
        let fail_close = *self.fail_sink_at.lock().unwrap() == Some(index);
        Ok(Box::new(FakeSink {
            path: path.to_path_buf(),
            settings: settings.clone(),
            frames: Vec::new(),
            fail_close,
        }))
    }

    fn stitch(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.stitch_calls.fetch_add(1, Ordering::SeqCst);
        if self.stitch_fails.load(Ordering::SeqCst) {
            return Err(MediaError::stitch_failed(
                "concat demuxer rejected input",
                parts.len(),
                None,
            ));
        }
        let mut body = String::new();
        for part in parts {
            body.push_str(&fs::read_to_string(part)?);
        }
        fs::write(output, body)?;
        Ok(())
    }

    fn resolve_encoding(&self, settings: EncodingSettings) -> EncodingSettings {
        if self.software_only.load(Ordering::SeqCst) {
            settings.with_software_fallback()
        } else {
            settings
        }
    }
}
