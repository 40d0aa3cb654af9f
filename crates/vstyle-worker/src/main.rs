//! `vstyle` command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vstyle_media::{check_ffmpeg, probe_video, FfmpegBackend};
use vstyle_models::{JobRequest, JobStatus, StyleKind};
use vstyle_queue::{CancelToken, JobQueue};
use vstyle_storage::{CheckpointStore, FileCheckpointStore};
use vstyle_worker::{
    metrics, stylizer_factory, JobExecutor, PresetCatalog, PreviewRequest, VideoProcessor,
    WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vstyle", author, version, about = "Batch video stylization", long_about = None)]
struct Cli {
    /// Checkpoint directory (overrides VSTYLE_CHECKPOINT_DIR)
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    /// Custom presets directory (overrides VSTYLE_PRESETS_DIR)
    #[arg(long, global = true)]
    presets_dir: Option<PathBuf>,

    /// ONNX model for the neural style (overrides VSTYLE_MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one input in one or more styles
    Render {
        /// Input video
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated styles, or `all`
        #[arg(short, long, value_delimiter = ',', required = true)]
        styles: Vec<String>,

        /// Preset name
        #[arg(short, long, default_value = "balanced")]
        preset: String,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Effect intensity, 0.1 to 2.0
        #[arg(long, default_value_t = 1.0)]
        intensity: f64,
    },
    /// Render a few seconds of one style
    Preview {
        /// Input video
        #[arg(short, long)]
        input: PathBuf,

        /// Style name
        #[arg(short, long)]
        style: String,

        /// Window start in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// Window length in seconds
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,

        /// Effect intensity, 0.1 to 2.0
        #[arg(long, default_value_t = 1.0)]
        intensity: f64,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Print input metadata as JSON
    Probe {
        input: PathBuf,
    },
    /// Inspect or remove resume checkpoints
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// List available presets
    Presets,
}

#[derive(Subcommand, Debug)]
enum CheckpointAction {
    List,
    /// Remove one checkpoint, or all when no key is given
    Clear {
        key: Option<String>,
    },
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vstyle=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = WorkerConfig::from_env();
    if let Some(dir) = cli.checkpoint_dir {
        config.checkpoint_dir = dir;
    }
    if let Some(dir) = cli.presets_dir {
        config.presets_dir = dir;
    }
    if let Some(model) = cli.model {
        config.model_path = Some(model);
    }

    match cli.command {
        Command::Render {
            input,
            styles,
            preset,
            out,
            intensity,
        } => {
            let styles = StyleKind::parse_list(&styles)?;
            let request = JobRequest::new(input, out, styles, preset).with_intensity(intensity);
            render(config, request).await
        }
        Command::Preview {
            input,
            style,
            start,
            seconds,
            intensity,
            out,
        } => {
            let style: StyleKind = style.parse()?;
            let request = PreviewRequest::new(input, out, style)
                .with_window(start, seconds)
                .with_intensity(intensity);
            preview(config, request).await
        }
        Command::Probe { input } => {
            let metadata = probe_video(&input)
                .with_context(|| format!("Failed to probe {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Checkpoints { action } => {
            checkpoints(&FileCheckpointStore::new(&config.checkpoint_dir), action)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Presets => {
            let catalog = PresetCatalog::load(&config.presets_dir)?;
            for p in catalog.list() {
                println!(
                    "{:<12} {:<12} crf {:<3} {:<7} chunk {:>5.1}s temporal {:<5} {}",
                    p.name,
                    p.encoding.codec,
                    p.encoding.crf,
                    p.encoding.encoder_preset,
                    p.chunk_duration_secs,
                    p.use_temporal,
                    p.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_processor(config: WorkerConfig) -> anyhow::Result<VideoProcessor> {
    let factory = stylizer_factory(&config).context("Failed to load the style model")?;
    let presets = PresetCatalog::load(&config.presets_dir)?;
    let checkpoints = Arc::new(FileCheckpointStore::new(&config.checkpoint_dir));
    Ok(
        VideoProcessor::new(config, Arc::new(FfmpegBackend::new()), checkpoints, presets)
            .with_stylizer_factory(factory),
    )
}

async fn preview(config: WorkerConfig, request: PreviewRequest) -> anyhow::Result<ExitCode> {
    check_ffmpeg().context("ffmpeg is required for previews")?;
    let processor = build_processor(config)?;

    let cancel = CancelToken::new();
    let mut task = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || processor.preview(&request, &cancel)
    });
    let result = tokio::select! {
        result = &mut task => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling preview");
            cancel.cancel();
            task.await?
        }
    };

    match result {
        Ok(outcome) => {
            println!(
                "{}  {} frames in {:.1}s ({:.1} fps)",
                outcome.output.display(),
                outcome.frames_processed,
                outcome.processing_secs,
                outcome.avg_fps
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Preview failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn render(config: WorkerConfig, request: JobRequest) -> anyhow::Result<ExitCode> {
    check_ffmpeg().context("ffmpeg is required for rendering")?;
    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
        info!("Metrics exporter listening on port {}", port);
    }
    info!("Worker config: {:?}", config);

    let processor = build_processor(config)?;

    let (queue, receiver) = JobQueue::new();
    let executor = Arc::new(JobExecutor::new(Arc::new(processor), queue.clone()));
    let worker = tokio::spawn({
        let executor = Arc::clone(&executor);
        async move { executor.run(receiver).await }
    });

    let job_id = queue.submit(request)?;
    info!(job_id = %job_id, "Submitted job");

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_frame = None;
    let job = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id = %job_id, "Interrupted, cancelling job");
                queue.cancel(&job_id)?;
            }
            _ = ticker.tick() => {}
        }

        let job = queue.get(&job_id)?;
        if job.is_terminal() {
            break job;
        }
        if job.status == JobStatus::Processing && last_frame != Some(job.current_frame) {
            last_frame = Some(job.current_frame);
            println!(
                "[{:5.1}%] frame {}/{} at {:.1} fps, eta {}",
                job.progress,
                job.current_frame,
                job.total_frames,
                job.observed_fps,
                job.eta_seconds
                    .map(|s| format!("{:.0}s", s))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    };

    // Lets a cancelled job reach its next chunk boundary before exiting.
    executor.shutdown();
    worker.await??;

    match job.status {
        JobStatus::Completed => {
            for output in &job.outputs {
                println!("{}", output.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        JobStatus::Cancelled => {
            eprintln!("Job {} cancelled", job.id);
            Ok(ExitCode::from(130))
        }
        _ => {
            for output in &job.outputs {
                println!("{}", output.display());
            }
            eprintln!(
                "Job {} failed: {}",
                job.id,
                job.error.as_deref().unwrap_or("unknown error")
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn checkpoints(store: &FileCheckpointStore, action: CheckpointAction) -> anyhow::Result<()> {
    match action {
        CheckpointAction::List => {
            for key in store.list_keys()? {
                match store.load(&key)? {
                    Some(r) => println!(
                        "{}  frame {}/{}  chunks {}  {} crf {}  {}",
                        key, r.last_frame, r.total_frames, r.chunks_completed, r.codec, r.crf,
                        r.updated_at
                    ),
                    None => println!("{}  (unreadable)", key),
                }
            }
        }
        CheckpointAction::Clear { key: Some(key) } => {
            store.clear(&key)?;
            println!("Cleared {}", key);
        }
        CheckpointAction::Clear { key: None } => {
            let keys = store.list_keys()?;
            for key in &keys {
                store.clear(key)?;
            }
            println!("Cleared {} checkpoints", keys.len());
        }
    }
    Ok(())
}
