//! Job processing: one input, every requested style, one output per style.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use vstyle_media::{FrameCharacteristicsAnalyzer, MediaBackend, OnnxStyleModel, StylizerFactory};
use vstyle_models::{CheckpointRecord, Job, ParamValue, ProgressUpdate, StyleKind, StyleParams};
use vstyle_queue::{CancelToken, JobQueue};
use vstyle_storage::CheckpointStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::{JobOutcome, JobRunner};
use crate::logging::JobLogger;
use crate::pipeline::{ChunkReport, ChunkedPipeline, PipelineOutcome, PipelineRequest};
use crate::presets::PresetCatalog;
use crate::preview::{
    preview_encoding, preview_path, preview_window, PreviewOutcome, PreviewRequest,
};

/// Stylizer factory for `config`, carrying the configured ONNX model if any.
pub fn stylizer_factory(config: &WorkerConfig) -> WorkerResult<StylizerFactory> {
    let factory = StylizerFactory::new();
    match &config.model_path {
        Some(path) => {
            let model = OnnxStyleModel::load(path)?;
            info!("Neural style uses {}", path.display());
            Ok(factory.with_inference_model(Arc::new(model)))
        }
        None => Ok(factory),
    }
}

/// `<output_dir>/<input_stem>_<style>.mp4`
pub fn output_path(output_dir: &Path, input: &Path, style: StyleKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}_{}.mp4", stem, style.as_filename_part()))
}

/// Overall progress for `frames_done` of style `index` out of `styles`.
fn overall_progress(index: usize, styles: usize, frames_done: u64, total: u64) -> f64 {
    if styles == 0 {
        return 0.0;
    }
    let within = if total > 0 {
        frames_done.min(total) as f64 / total as f64
    } else {
        0.0
    };
    ((index as f64 + within) / styles as f64 * 100.0).clamp(0.0, 100.0)
}

/// Runs jobs taken from the queue.
pub struct VideoProcessor {
    config: WorkerConfig,
    backend: Arc<dyn MediaBackend>,
    pipeline: ChunkedPipeline,
    presets: PresetCatalog,
    factory: StylizerFactory,
    analyzer: FrameCharacteristicsAnalyzer,
}

impl VideoProcessor {
    pub fn new(
        config: WorkerConfig,
        backend: Arc<dyn MediaBackend>,
        checkpoints: Arc<dyn CheckpointStore>,
        presets: PresetCatalog,
    ) -> Self {
        Self {
            analyzer: FrameCharacteristicsAnalyzer::new(config.sample_frames),
            pipeline: ChunkedPipeline::new(Arc::clone(&backend), checkpoints),
            factory: StylizerFactory::new(),
            config,
            backend,
            presets,
        }
    }

    /// Use a custom factory, e.g. one carrying an inference model.
    pub fn with_stylizer_factory(mut self, factory: StylizerFactory) -> Self {
        self.factory = factory;
        self
    }

    fn style_params(&self, style: StyleKind, derived: Option<&StyleParams>) -> StyleParams {
        let mut params = derived.cloned().unwrap_or_default();
        if style.is_inference_based() {
            params.set("tile_size", ParamValue::Int(self.config.tile_size as i64));
            params.set("overlap", ParamValue::Int(self.config.tile_overlap as i64));
        }
        params
    }

    /// Process every style of `job` in order.
    ///
    /// A failing style does not stop the remaining ones; their errors are
    /// collected into [`WorkerError::StylesFailed`]. Progress and outputs are
    /// written to `queue` as they happen.
    pub fn process(
        &self,
        job: &Job,
        cancel: &CancelToken,
        queue: &JobQueue,
    ) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&job.id, "stylize");
        let _span = logger.create_span().entered();

        let preset = self
            .presets
            .get(&job.preset_name)
            .ok_or_else(|| WorkerError::unknown_preset(&job.preset_name))?;

        let source = self.backend.source(&job.input_path)?;
        let metadata = source.probe()?;
        logger.log_start(&format!(
            "{} ({}x{} @ {:.3} fps, {} frames), styles [{}], preset {}",
            job.input_path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            job.styles
                .iter()
                .map(|s| s.display_name())
                .collect::<Vec<_>>()
                .join(", "),
            preset.name
        ));

        let scene = self.analyzer.analyze_source(source.as_ref(), &metadata);
        let params = self
            .analyzer
            .derive_params(&scene, &job.styles, job.effect_intensity);

        std::fs::create_dir_all(&job.output_dir)?;

        let styles = job.styles.len();
        let mut failures = Vec::new();

        for (index, style) in job.styles.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                logger.log_progress("cancelled before next style");
                return Ok(JobOutcome::Cancelled);
            }

            let output = output_path(&job.output_dir, &job.input_path, style);
            let stylizer = self
                .factory
                .create(style, &self.style_params(style, params.get(&style)));
            let request = PipelineRequest {
                input: &job.input_path,
                output: &output,
                source: source.as_ref(),
                stylizer: stylizer.as_ref(),
                chunk_duration_secs: preset.chunk_duration_secs,
                use_temporal: preset.use_temporal,
                encoding: preset.encoding.clone(),
                checkpoint_key: Some(CheckpointRecord::key_for(&job.input_path, style)),
                frame_range: None,
            };

            logger.log_progress(&format!(
                "style {}/{}: {} -> {}",
                index + 1,
                styles,
                style.display_name(),
                output.display()
            ));

            let started = Instant::now();
            let remaining_styles = (styles - index - 1) as u64;
            let mut on_progress = |report: &ChunkReport| {
                let update = progress_update(index, styles, remaining_styles, report, started);
                if let Err(e) = queue.update_progress(&job.id, &update) {
                    warn!("Dropping progress for {}: {}", job.id, e);
                }
            };

            match self.pipeline.run(&request, cancel, &mut on_progress) {
                Ok(PipelineOutcome::Completed {
                    output,
                    frames_processed,
                    start_frame,
                    ..
                }) => {
                    if let Err(e) = queue.push_output(&job.id, output.clone()) {
                        warn!("Could not record output for {}: {}", job.id, e);
                    }
                    logger.log_progress(&format!(
                        "{} done: {} frames{}",
                        style.display_name(),
                        frames_processed,
                        if start_frame > 0 {
                            format!(" (resumed at {})", start_frame)
                        } else {
                            String::new()
                        }
                    ));
                }
                Ok(PipelineOutcome::Cancelled { frames_done }) => {
                    logger.log_progress(&format!(
                        "cancelled during {} at frame {}",
                        style.display_name(),
                        frames_done
                    ));
                    return Ok(JobOutcome::Cancelled);
                }
                Err(e) if e.is_probe_error() => return Err(e),
                Err(e) => {
                    logger.log_error(&format!("{} failed: {}", style.display_name(), e));
                    failures.push(format!("{}: {}", style.display_name(), e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(WorkerError::StylesFailed(failures));
        }
        logger.log_completion(&format!("{} outputs", styles));
        Ok(JobOutcome::Completed)
    }
}

impl VideoProcessor {
    /// Render one style over a short window of the input.
    ///
    /// Parameters are derived from the whole input as for a full render, so
    /// the preview shows what the render will produce. Never checkpointed.
    pub fn preview(
        &self,
        request: &PreviewRequest,
        cancel: &CancelToken,
    ) -> WorkerResult<PreviewOutcome> {
        request.validate()?;
        let style = request.style;

        let source = self.backend.source(&request.input)?;
        let metadata = source.probe()?;
        let window = preview_window(&metadata, request.start_secs, request.duration_secs);

        let scene = self.analyzer.analyze_source(source.as_ref(), &metadata);
        let params = self
            .analyzer
            .derive_params(&scene, &[style], request.effect_intensity);
        let stylizer = self
            .factory
            .create(style, &self.style_params(style, params.get(&style)));

        std::fs::create_dir_all(&request.output_dir)?;
        let output = preview_path(&request.output_dir, &request.input, style);
        let pipeline_request = PipelineRequest {
            input: &request.input,
            output: &output,
            source: source.as_ref(),
            stylizer: stylizer.as_ref(),
            // One chunk covers the whole window.
            chunk_duration_secs: request.duration_secs,
            use_temporal: false,
            encoding: preview_encoding(),
            checkpoint_key: None,
            frame_range: Some(window),
        };

        info!(
            "Preview of {} in {}: frames {}..{}",
            request.input.display(),
            style.display_name(),
            window.start,
            window.end
        );
        let started = Instant::now();
        match self.pipeline.run(&pipeline_request, cancel, &mut |_| {})? {
            PipelineOutcome::Completed {
                output,
                frames_processed,
                ..
            } => {
                let processing_secs = started.elapsed().as_secs_f64();
                let avg_fps = if processing_secs > 0.0 {
                    frames_processed as f64 / processing_secs
                } else {
                    0.0
                };
                Ok(PreviewOutcome {
                    output,
                    frames_processed,
                    processing_secs,
                    avg_fps,
                })
            }
            PipelineOutcome::Cancelled { .. } => {
                Err(WorkerError::job_failed("preview cancelled"))
            }
        }
    }
}

/// Job-level progress after a chunk of style `index` completes.
fn progress_update(
    index: usize,
    styles: usize,
    remaining_styles: u64,
    report: &ChunkReport,
    started: Instant,
) -> ProgressUpdate {
    let elapsed = started.elapsed().as_secs_f64();
    let processed = report.frames_done.saturating_sub(report.start_frame);
    let observed_fps = if elapsed > 0.0 {
        processed as f64 / elapsed
    } else {
        0.0
    };
    let remaining_frames = report.total_frames.saturating_sub(report.frames_done)
        + remaining_styles * report.total_frames;
    let eta_seconds = (observed_fps > 0.0).then(|| remaining_frames as f64 / observed_fps);

    ProgressUpdate {
        progress: overall_progress(index, styles, report.frames_done, report.total_frames),
        current_frame: report.frames_done,
        total_frames: report.total_frames,
        observed_fps,
        eta_seconds,
    }
}

impl JobRunner for VideoProcessor {
    fn run(&self, job: &Job, cancel: &CancelToken, queue: &JobQueue) -> WorkerResult<JobOutcome> {
        self.process(job, cancel, queue)
    }
}
