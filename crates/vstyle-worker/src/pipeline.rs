//! Resumable chunked rendering of one (input, style) pair.
//!
//! The frame range is cut into fixed-size chunks. Each chunk is decoded,
//! stylized and encoded into its own file, then a checkpoint is written.
//! After the last chunk the files are joined by stream copy. A later run
//! with the same checkpoint key and encoding picks up after the last
//! completed chunk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use vstyle_media::fs_utils::{move_file, remove_files_best_effort};
use vstyle_media::{
    FrameSource, MediaBackend, MediaError, SinkSettings, Stylizer, TemporalSmoother,
};
use vstyle_models::{CheckpointRecord, EncodingSettings, VideoMetadata};
use vstyle_queue::CancelToken;
use vstyle_storage::CheckpointStore;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Half-open frame range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Partition `[start, total)` into consecutive chunks of `chunk_frames`.
///
/// The last chunk may be shorter. Empty when `start >= total`.
pub fn plan_chunks(start: u64, total: u64, chunk_frames: u64) -> Vec<Chunk> {
    let step = chunk_frames.max(1);
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < total {
        let end = (cursor + step).min(total);
        chunks.push(Chunk { start: cursor, end });
        cursor = end;
    }
    chunks
}

/// Temporary file for one chunk, next to the final output.
pub fn chunk_path(output: &Path, start: u64, end: u64) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(format!(".chunk_{}_{}.mp4", start, end));
    output.with_file_name(name)
}

/// Chunk files left next to `output` by earlier runs, keyed by start frame.
fn discover_chunks(output: &Path) -> HashMap<u64, (u64, PathBuf)> {
    let mut found = HashMap::new();
    let Some(file_name) = output.file_name().and_then(|n| n.to_str()) else {
        return found;
    };
    let prefix = format!("{}.chunk_", file_name);
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Ok(entries) = fs::read_dir(&dir) else {
        return found;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(range) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".mp4"))
        else {
            continue;
        };
        let Some((start, end)) = range.split_once('_') else {
            continue;
        };
        if let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) {
            if end > start {
                found.insert(start, (end, entry.path()));
            }
        }
    }
    found
}

/// Walk chunk files from frame 0 to `last_frame`. `None` if the chain has a gap.
fn contiguous_chain(
    found: &HashMap<u64, (u64, PathBuf)>,
    last_frame: u64,
) -> Option<Vec<PathBuf>> {
    let mut chain = Vec::new();
    let mut cursor = 0;
    while cursor < last_frame {
        let (end, path) = found.get(&cursor)?;
        if *end > last_frame {
            return None;
        }
        chain.push(path.clone());
        cursor = *end;
    }
    Some(chain)
}

/// One pipeline invocation.
pub struct PipelineRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub source: &'a dyn FrameSource,
    pub stylizer: &'a dyn Stylizer,
    pub chunk_duration_secs: f64,
    pub use_temporal: bool,
    /// Requested encoding; the backend may substitute a fallback codec.
    pub encoding: EncodingSettings,
    /// Resume identity. Without one the run is not checkpointed.
    pub checkpoint_key: Option<String>,
    /// Render only these frames, clamped to the input. Never checkpointed.
    pub frame_range: Option<Chunk>,
}

/// Reported after every completed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReport {
    /// Exclusive end of the completed range, absolute within the input
    pub frames_done: u64,
    pub total_frames: u64,
    /// Frame this run started from (non-zero when resumed or windowed)
    pub start_frame: u64,
}

pub type ChunkProgress<'a> = dyn FnMut(&ChunkReport) + 'a;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        output: PathBuf,
        /// Frames encoded by this run, excluding resumed ones
        frames_processed: u64,
        /// Frame the run started from
        start_frame: u64,
        chunks: usize,
    },
    /// Stopped at a chunk boundary; the checkpoint is kept.
    Cancelled { frames_done: u64 },
}

/// Drives decode, stylize and encode for one output file.
pub struct ChunkedPipeline {
    backend: Arc<dyn MediaBackend>,
    checkpoints: Arc<dyn CheckpointStore>,
}

struct ResumePoint {
    start_frame: u64,
    /// Exclusive last frame to render. Below the probed count when an
    /// earlier run found the source shorter than advertised.
    end_frame: u64,
    prior_chunks: Vec<PathBuf>,
    chunks_completed: u32,
}

impl ResumePoint {
    fn fresh(start_frame: u64, end_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame,
            prior_chunks: Vec::new(),
            chunks_completed: 0,
        }
    }
}

impl ChunkedPipeline {
    pub fn new(backend: Arc<dyn MediaBackend>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            backend,
            checkpoints,
        }
    }

    /// Render `request.output`, resuming from a matching checkpoint.
    pub fn run(
        &self,
        request: &PipelineRequest<'_>,
        cancel: &CancelToken,
        on_progress: &mut ChunkProgress<'_>,
    ) -> WorkerResult<PipelineOutcome> {
        let metadata = request.source.probe()?;
        let chunk_frames = metadata.chunk_frames(request.chunk_duration_secs);
        let encoding = self.backend.resolve_encoding(request.encoding.clone());

        if metadata.total_frames == 0 {
            return Err(WorkerError::EmptyInput(request.input.display().to_string()));
        }

        let (checkpoint_key, resume) = match request.frame_range {
            Some(range) => {
                let start = range.start.min(metadata.total_frames);
                let end = range.end.min(metadata.total_frames);
                if start >= end {
                    return Err(WorkerError::EmptyInput(format!(
                        "{} (frames {}..{})",
                        request.input.display(),
                        range.start,
                        range.end
                    )));
                }
                (None, ResumePoint::fresh(start, end))
            }
            None => {
                let key = request.checkpoint_key.as_deref();
                let resume = match key {
                    Some(key) => self.resume_point(key, request.output, &metadata, &encoding)?,
                    None => ResumePoint::fresh(0, metadata.total_frames),
                };
                (key, resume)
            }
        };
        let start_frame = resume.start_frame;
        let mut total = resume.end_frame;
        let resumed = !resume.prior_chunks.is_empty();

        let chunks = plan_chunks(start_frame, total, chunk_frames);
        info!(
            "Rendering {} with {}: frames {}..{} in {} chunks of {} ({} {} crf {})",
            request.output.display(),
            request.stylizer.name(),
            start_frame,
            total,
            chunks.len(),
            chunk_frames,
            if resumed { "resumed," } else { "fresh," },
            encoding.codec,
            encoding.crf
        );

        let settings = SinkSettings::for_video(&metadata, encoding.clone());
        let mut smoother = request.use_temporal.then(TemporalSmoother::default);
        let mut parts = resume.prior_chunks;
        let mut chunks_completed = resume.chunks_completed;
        let mut frames_done = start_frame;

        for chunk in &chunks {
            if cancel.is_cancelled() {
                info!(
                    "Cancelled before chunk {}..{}, checkpoint kept at frame {}",
                    chunk.start, chunk.end, frames_done
                );
                return Ok(PipelineOutcome::Cancelled { frames_done });
            }

            if let Some(smoother) = smoother.as_mut() {
                smoother.reset();
            }
            let started = Instant::now();
            let Some((part, end)) =
                self.render_chunk(request, *chunk, &settings, smoother.as_mut())?
            else {
                // Source ran dry exactly on a chunk boundary.
                if parts.is_empty() {
                    return Err(MediaError::InvalidVideo(format!(
                        "no frames decoded from frame {}",
                        chunk.start
                    ))
                    .into());
                }
                warn!(
                    "Source ended at frame {}, {} frames short of the probed count",
                    frames_done,
                    metadata.total_frames - frames_done
                );
                if let Some(key) = checkpoint_key {
                    self.save_checkpoint(
                        key,
                        frames_done,
                        frames_done,
                        chunks_completed,
                        &encoding,
                    );
                }
                break;
            };
            parts.push(part);
            chunks_completed += 1;
            frames_done = end;

            metrics::record_chunk(
                request.stylizer.name(),
                end - chunk.start,
                started.elapsed().as_secs_f64(),
            );

            // Source ran dry inside this chunk; the real end becomes the total.
            let exhausted = end < chunk.end;
            if exhausted {
                total = end;
            }
            if let Some(key) = checkpoint_key {
                self.save_checkpoint(key, end, total, chunks_completed, &encoding);
            }
            on_progress(&ChunkReport {
                frames_done,
                total_frames: total,
                start_frame,
            });

            if exhausted {
                break;
            }
        }

        self.finalize(&parts, request.output)?;

        if let Some(key) = checkpoint_key {
            self.checkpoints.clear(key)?;
        }

        Ok(PipelineOutcome::Completed {
            output: request.output.to_path_buf(),
            frames_processed: frames_done - start_frame,
            start_frame,
            chunks: parts.len(),
        })
    }

    fn save_checkpoint(
        &self,
        key: &str,
        last_frame: u64,
        total_frames: u64,
        chunks_completed: u32,
        encoding: &EncodingSettings,
    ) {
        let record = CheckpointRecord::new(
            last_frame,
            total_frames,
            chunks_completed,
            encoding.codec.clone(),
            encoding.crf,
        );
        if let Err(e) = self.checkpoints.save(key, &record) {
            warn!("Failed to save checkpoint {}: {}", key, e);
        }
    }

    /// Where to start given the stored checkpoint and the files on disk.
    fn resume_point(
        &self,
        key: &str,
        output: &Path,
        metadata: &VideoMetadata,
        encoding: &EncodingSettings,
    ) -> WorkerResult<ResumePoint> {
        let fresh = || ResumePoint::fresh(0, metadata.total_frames);
        let Some(record) = self.checkpoints.load(key)? else {
            return Ok(fresh());
        };
        let found = discover_chunks(output);

        // Every decodable frame was encoded; only the stitch is left.
        let ended_short = record.last_frame == record.total_frames
            && record.total_frames < metadata.total_frames;

        let reason = if !record.matches_encoding(&encoding.codec, encoding.crf) {
            Some(format!(
                "encoded with {} crf {}, run uses {} crf {}",
                record.codec, record.crf, encoding.codec, encoding.crf
            ))
        } else if (record.total_frames != metadata.total_frames && !ended_short)
            || record.last_frame > record.total_frames
        {
            Some(format!(
                "recorded {} of {} frames, input now has {}",
                record.last_frame, record.total_frames, metadata.total_frames
            ))
        } else {
            None
        };

        let chain = match reason {
            Some(reason) => {
                warn!("Discarding checkpoint {}: {}", key, reason);
                None
            }
            None => {
                let chain = contiguous_chain(&found, record.last_frame);
                if chain.is_none() {
                    warn!(
                        "Discarding checkpoint {}: chunk files up to frame {} are missing",
                        key, record.last_frame
                    );
                }
                chain
            }
        };

        let Some(chain) = chain else {
            let stale: Vec<PathBuf> = found.into_values().map(|(_, p)| p).collect();
            remove_files_best_effort(&stale);
            self.checkpoints.clear(key)?;
            return Ok(fresh());
        };

        // Leftovers past the checkpoint come from an interrupted chunk.
        let stale: Vec<PathBuf> = found
            .into_values()
            .map(|(_, p)| p)
            .filter(|p| !chain.contains(p))
            .collect();
        remove_files_best_effort(&stale);

        metrics::record_resume();
        info!(
            "Resuming {} from frame {} of {} ({} chunks on disk)",
            key,
            record.last_frame,
            record.total_frames,
            chain.len()
        );
        Ok(ResumePoint {
            start_frame: record.last_frame,
            end_frame: record.total_frames,
            prior_chunks: chain,
            chunks_completed: record.chunks_completed,
        })
    }

    /// Encode one chunk. Returns the file and the exclusive end frame
    /// reached, or `None` when the source had no frames left at its start.
    fn render_chunk(
        &self,
        request: &PipelineRequest<'_>,
        chunk: Chunk,
        settings: &SinkSettings,
        mut smoother: Option<&mut TemporalSmoother>,
    ) -> WorkerResult<Option<(PathBuf, u64)>> {
        let path = chunk_path(request.output, chunk.start, chunk.end);
        let mut frames = request.source.open(chunk.start)?;
        let mut sink = self.backend.open_sink(&path, settings)?;

        let mut written = 0u64;
        while written < chunk.len() {
            let Some(frame) = frames.next() else {
                break;
            };
            let styled = request.stylizer.process(&frame?)?;
            let styled = match smoother.as_mut() {
                Some(smoother) => smoother.smooth(&styled),
                None => styled,
            };
            sink.write(&styled)?;
            written += 1;
        }
        drop(frames);

        if written == 0 {
            if let Err(e) = sink.close() {
                debug!("Closing empty chunk {}: {}", path.display(), e);
            }
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        sink.close()?;

        let end = chunk.start + written;
        if end == chunk.end {
            debug!("Chunk {}..{} written to {}", chunk.start, chunk.end, path.display());
            return Ok(Some((path, end)));
        }

        warn!(
            "Source ended at frame {} inside chunk {}..{}",
            end, chunk.start, chunk.end
        );
        let short = chunk_path(request.output, chunk.start, end);
        move_file(&path, &short)?;
        Ok(Some((short, end)))
    }

    /// Join chunk files into `output`. A single chunk is renamed in place.
    fn finalize(&self, parts: &[PathBuf], output: &Path) -> WorkerResult<()> {
        match parts {
            [] => Err(WorkerError::job_failed(format!(
                "no chunks produced for {}",
                output.display()
            ))),
            [single] => {
                move_file(single, output)?;
                Ok(())
            }
            _ => {
                if let Err(e) = self.backend.stitch(parts, output) {
                    metrics::record_stitch_failure();
                    warn!(
                        "Stitching {} chunks into {} failed, chunk files kept",
                        parts.len(),
                        output.display()
                    );
                    return Err(e.into());
                }
                remove_files_best_effort(parts);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_frame_log, FakeBackend, FakeSource};
    use tempfile::TempDir;
    use vstyle_media::IdentityStylizer;
    use vstyle_storage::FileCheckpointStore;

    fn partition_ok(start: u64, total: u64, chunk_frames: u64) {
        let chunks = plan_chunks(start, total, chunk_frames);
        if start >= total {
            assert!(chunks.is_empty());
            return;
        }
        assert_eq!(chunks[0].start, start);
        assert_eq!(chunks.last().unwrap().end, total);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= chunk_frames.max(1)));
    }

    #[test]
    fn test_partition_covers_range() {
        for total in [0, 1, 2, 7, 29, 30, 31, 299, 300, 301, 1000] {
            for chunk in [1, 2, 3, 30, 150, 300, 1000] {
                for start in [0, 1, 30, total / 2, total] {
                    partition_ok(start, total, chunk);
                }
            }
        }
    }

    #[test]
    fn test_partition_scenarios() {
        assert_eq!(plan_chunks(0, 300, 300), vec![Chunk { start: 0, end: 300 }]);
        assert_eq!(
            plan_chunks(0, 300, 150),
            vec![Chunk { start: 0, end: 150 }, Chunk { start: 150, end: 300 }]
        );
        assert_eq!(plan_chunks(0, 100, 30).last(), Some(&Chunk { start: 90, end: 100 }));
        assert!(plan_chunks(0, 0, 30).is_empty());
    }

    #[test]
    fn test_chunk_path_naming() {
        assert_eq!(
            chunk_path(Path::new("/out/clip_cartoon.mp4"), 0, 150),
            PathBuf::from("/out/clip_cartoon.mp4.chunk_0_150.mp4")
        );
    }

    #[test]
    fn test_contiguous_chain_requires_no_gaps() {
        let mut found = HashMap::new();
        found.insert(0, (10, PathBuf::from("a")));
        found.insert(10, (20, PathBuf::from("b")));
        found.insert(30, (40, PathBuf::from("d")));
        assert_eq!(
            contiguous_chain(&found, 20),
            Some(vec![PathBuf::from("a"), PathBuf::from("b")])
        );
        assert_eq!(contiguous_chain(&found, 0), Some(vec![]));
        assert_eq!(contiguous_chain(&found, 40), None);
        assert_eq!(contiguous_chain(&found, 15), None);
    }

    struct Fixture {
        dir: TempDir,
        backend: Arc<FakeBackend>,
        store: Arc<FileCheckpointStore>,
        source: FakeSource,
    }

    impl Fixture {
        fn new(total_frames: u64) -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(FileCheckpointStore::new(dir.path().join("ckpt")));
            Self {
                backend: Arc::new(FakeBackend::new()),
                store,
                source: FakeSource::new(total_frames, 30.0),
                dir,
            }
        }

        fn pipeline(&self) -> ChunkedPipeline {
            ChunkedPipeline::new(self.backend.clone(), self.store.clone())
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("clip_cartoon.mp4")
        }

        fn request<'a>(&'a self, output: &'a Path, chunk_secs: f64) -> PipelineRequest<'a> {
            PipelineRequest {
                input: Path::new("clip.mp4"),
                output,
                source: &self.source,
                stylizer: &IdentityStylizer,
                chunk_duration_secs: chunk_secs,
                use_temporal: false,
                encoding: EncodingSettings::new("libx264", 18, "medium"),
                checkpoint_key: Some("clip_cartoon".to_string()),
                frame_range: None,
            }
        }

        fn chunk_files(&self) -> Vec<PathBuf> {
            let mut files: Vec<PathBuf> = fs::read_dir(self.dir.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .filter(|p| p.to_string_lossy().contains(".chunk_"))
                .collect();
            files.sort();
            files
        }
    }

    #[test]
    fn test_single_chunk_is_renamed_not_stitched() {
        let fx = Fixture::new(300);
        let output = fx.output();
        let mut progress = Vec::new();

        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 10.0), &CancelToken::new(), &mut |r| {
                progress.push((r.frames_done, r.total_frames))
            })
            .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Completed {
                output: output.clone(),
                frames_processed: 300,
                start_frame: 0,
                chunks: 1
            }
        );
        assert_eq!(progress, vec![(300, 300)]);
        assert_eq!(fx.backend.stitch_calls(), 0);
        assert_eq!(read_frame_log(&output), (0..300).collect::<Vec<_>>());
        assert!(fx.chunk_files().is_empty());
        assert!(fx.store.load("clip_cartoon").unwrap().is_none());
    }

    #[test]
    fn test_two_chunks_stitched_in_order() {
        let fx = Fixture::new(300);
        let output = fx.output();
        let mut progress = Vec::new();

        fx.pipeline()
            .run(&fx.request(&output, 5.0), &CancelToken::new(), &mut |r| {
                progress.push((r.frames_done, r.total_frames))
            })
            .unwrap();

        assert_eq!(progress, vec![(150, 300), (300, 300)]);
        assert_eq!(fx.backend.stitch_calls(), 1);
        assert_eq!(read_frame_log(&output), (0..300).collect::<Vec<_>>());
        assert!(fx.chunk_files().is_empty());
    }

    #[test]
    fn test_crash_then_resume_matches_clean_run() {
        let fx = Fixture::new(300);
        let output = fx.output();

        // Third chunk's encoder dies.
        fx.backend.fail_sink_close_at(2);
        let err = fx
            .pipeline()
            .run(&fx.request(&output, 2.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, WorkerError::Media(MediaError::EncodeFailed { .. })));
        assert!(!output.exists());

        let record = fx.store.load("clip_cartoon").unwrap().unwrap();
        assert_eq!(record.last_frame, 120);
        assert_eq!(record.chunks_completed, 2);
        assert_eq!(record.codec, "libx264");

        fx.backend.clear_failures();
        let opened_before = fx.source.opened_at().len();
        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 2.0), &CancelToken::new(), &mut |_| {})
            .unwrap();

        // Only the unfinished chunks were decoded again.
        assert_eq!(fx.source.opened_at()[opened_before..], [120, 180, 240]);
        match outcome {
            PipelineOutcome::Completed {
                frames_processed,
                start_frame,
                chunks,
                ..
            } => {
                assert_eq!(start_frame, 120);
                assert_eq!(frames_processed, 180);
                assert_eq!(chunks, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(read_frame_log(&output), (0..300).collect::<Vec<_>>());
        assert!(fx.chunk_files().is_empty());
        assert!(fx.store.load("clip_cartoon").unwrap().is_none());
    }

    #[test]
    fn test_encoding_mismatch_restarts_from_zero() {
        let fx = Fixture::new(90);
        let output = fx.output();
        fx.backend.fail_sink_close_at(1);
        fx.pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert_eq!(fx.store.load("clip_cartoon").unwrap().unwrap().last_frame, 30);
        fx.backend.clear_failures();

        let mut request = fx.request(&output, 1.0);
        request.encoding = EncodingSettings::new("libx264", 23, "medium");
        let outcome = fx
            .pipeline()
            .run(&request, &CancelToken::new(), &mut |_| {})
            .unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 0, frames_processed: 90, .. }
        ));
        assert_eq!(read_frame_log(&output), (0..90).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_chunk_files_restart_from_zero() {
        let fx = Fixture::new(90);
        let output = fx.output();
        fx.store
            .save("clip_cartoon", &CheckpointRecord::new(60, 90, 2, "libx264", 18))
            .unwrap();

        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 0, frames_processed: 90, .. }
        ));
    }

    #[test]
    fn test_cancel_before_first_chunk_keeps_nothing() {
        let fx = Fixture::new(90);
        let output = fx.output();
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &cancel, &mut |_| {})
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Cancelled { frames_done: 0 });
        assert!(!output.exists());
    }

    #[test]
    fn test_cancel_between_chunks_keeps_checkpoint() {
        let fx = Fixture::new(90);
        let output = fx.output();
        let cancel = CancelToken::new();

        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &cancel, &mut |r| {
                if r.frames_done == 30 {
                    cancel.cancel();
                }
            })
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::Cancelled { frames_done: 30 });
        assert!(!output.exists());
        assert_eq!(fx.store.load("clip_cartoon").unwrap().unwrap().last_frame, 30);
        assert_eq!(fx.chunk_files().len(), 1);
    }

    #[test]
    fn test_stitch_failure_keeps_chunks_and_retry_only_stitches() {
        let fx = Fixture::new(90);
        let output = fx.output();
        fx.backend.fail_stitch(true);

        let err = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(err.is_stitch_error());
        assert_eq!(fx.chunk_files().len(), 3);
        assert_eq!(fx.store.load("clip_cartoon").unwrap().unwrap().last_frame, 90);

        fx.backend.fail_stitch(false);
        let sinks_before = fx.backend.sinks_opened();
        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert_eq!(fx.backend.sinks_opened(), sinks_before);
        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 90, frames_processed: 0, chunks: 3, .. }
        ));
        assert_eq!(read_frame_log(&output), (0..90).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_source_stitch_retry_only_stitches() {
        let fx = Fixture::new(90);
        fx.source.truncate_at(75);
        fx.backend.fail_stitch(true);
        let output = fx.output();

        let err = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(err.is_stitch_error());
        let record = fx.store.load("clip_cartoon").unwrap().unwrap();
        assert_eq!((record.last_frame, record.total_frames), (75, 75));

        fx.backend.fail_stitch(false);
        let sinks_before = fx.backend.sinks_opened();
        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert_eq!(fx.backend.sinks_opened(), sinks_before);
        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 75, frames_processed: 0, chunks: 3, .. }
        ));
        assert_eq!(read_frame_log(&output), (0..75).collect::<Vec<_>>());
        assert!(fx.chunk_files().is_empty());
        assert!(fx.store.load("clip_cartoon").unwrap().is_none());
    }

    #[test]
    fn test_source_ending_on_chunk_boundary_keeps_earlier_chunks() {
        let fx = Fixture::new(90);
        fx.source.truncate_at(60);
        let output = fx.output();
        let mut progress = Vec::new();

        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |r| {
                progress.push(r.frames_done)
            })
            .unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { frames_processed: 60, chunks: 2, .. }
        ));
        assert_eq!(progress, vec![30, 60]);
        assert_eq!(read_frame_log(&output), (0..60).collect::<Vec<_>>());
        assert!(fx.chunk_files().is_empty());
        assert!(fx.store.load("clip_cartoon").unwrap().is_none());
    }

    #[test]
    fn test_boundary_end_with_failed_stitch_resumes_at_real_end() {
        let fx = Fixture::new(90);
        fx.source.truncate_at(60);
        fx.backend.fail_stitch(true);
        let output = fx.output();

        fx.pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        let record = fx.store.load("clip_cartoon").unwrap().unwrap();
        assert_eq!((record.last_frame, record.total_frames), (60, 60));

        fx.backend.fail_stitch(false);
        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 60, chunks: 2, .. }
        ));
        assert_eq!(read_frame_log(&output), (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_source_with_no_frames_fails() {
        let fx = Fixture::new(90);
        fx.source.truncate_at(0);
        let output = fx.output();
        let err = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, WorkerError::Media(MediaError::InvalidVideo(_))));
        assert!(fx.chunk_files().is_empty());
    }

    #[test]
    fn test_frame_range_renders_only_the_window() {
        let fx = Fixture::new(90);
        let output = fx.output();
        let mut request = fx.request(&output, 1.0);
        request.frame_range = Some(Chunk { start: 45, end: 200 });

        let outcome = fx
            .pipeline()
            .run(&request, &CancelToken::new(), &mut |_| {})
            .unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { start_frame: 45, frames_processed: 45, chunks: 2, .. }
        ));
        assert_eq!(fx.source.opened_at(), vec![45, 75]);
        assert_eq!(read_frame_log(&output), (45..90).collect::<Vec<_>>());
        assert!(fx.store.load("clip_cartoon").unwrap().is_none());

        request.frame_range = Some(Chunk { start: 90, end: 120 });
        let err = fx
            .pipeline()
            .run(&request, &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, WorkerError::EmptyInput(_)));
    }

    #[test]
    fn test_codec_fallback_is_recorded_in_checkpoint() {
        let fx = Fixture::new(60);
        fx.backend.force_software_encoding();
        let output = fx.output();
        fx.backend.fail_sink_close_at(1);

        let mut request = fx.request(&output, 1.0);
        request.encoding = EncodingSettings::new("h264_nvenc", 18, "p4");
        fx.pipeline()
            .run(&request, &CancelToken::new(), &mut |_| {})
            .unwrap_err();

        assert_eq!(fx.store.load("clip_cartoon").unwrap().unwrap().codec, "libx264");
    }

    #[test]
    fn test_probe_failure_starts_no_chunk() {
        let fx = Fixture::new(60);
        fx.source.fail_probe();
        let output = fx.output();
        let err = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(err.is_probe_error());
        assert_eq!(fx.backend.sinks_opened(), 0);
    }

    #[test]
    fn test_short_source_ends_early() {
        let fx = Fixture::new(90);
        fx.source.truncate_at(75);
        let output = fx.output();
        let outcome = fx
            .pipeline()
            .run(&fx.request(&output, 1.0), &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert!(matches!(
            outcome,
            PipelineOutcome::Completed { frames_processed: 75, chunks: 3, .. }
        ));
        assert_eq!(read_frame_log(&output), (0..75).collect::<Vec<_>>());
    }
}
