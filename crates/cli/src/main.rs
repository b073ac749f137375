use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use blinkgate_core::capture::domain::frame_source::{CaptureTarget, FrameSource};
use blinkgate_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use blinkgate_core::config::GateConfig;
use blinkgate_core::detection::domain::face_detector::FaceDetector;
use blinkgate_core::detection::domain::face_mesher::FaceMesher;
use blinkgate_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use blinkgate_core::detection::infrastructure::onnx_face_mesher::{
    OnnxFaceMesher, DEFAULT_MIN_PRESENCE,
};
use blinkgate_core::pipeline::frame_sink::FrameSink;
use blinkgate_core::pipeline::infrastructure::json_lines_sink::JsonLinesFrameSink;
use blinkgate_core::pipeline::liveness_gate_use_case::LivenessGateUseCase;
use blinkgate_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use blinkgate_core::recognition::domain::face_recognizer::FaceRecognizer;
use blinkgate_core::recognition::domain::gallery::Gallery;
use blinkgate_core::recognition::infrastructure::command_face_recognizer::CommandFaceRecognizer;
use blinkgate_core::recognition::infrastructure::embedding_face_recognizer::EmbeddingFaceRecognizer;
use blinkgate_core::shared::constants::{
    DEFAULT_GALLERY_DIR, DETECTOR_MODEL_NAME, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
    MESH_MODEL_NAME,
};
use blinkgate_core::shared::model_resolver;

/// Admit camera faces that are both recognized and blinking.
#[derive(Parser)]
#[command(name = "blinkgate")]
struct Cli {
    /// Capture device index or name (default: 0).
    #[arg(long, conflicts_with = "input")]
    device: Option<String>,

    /// Replay a recorded video instead of a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Reference gallery: one subdirectory of images per identity.
    #[arg(long, default_value = DEFAULT_GALLERY_DIR)]
    gallery: PathBuf,

    /// Directory searched for ONNX models not in the cache.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// JSON config file (default: the per-user config, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Eye aspect ratio below which the eye counts as closed.
    #[arg(long)]
    ear_threshold: Option<f64>,

    /// Consecutive closed-eye frames that make a blink.
    #[arg(long)]
    blink_frames: Option<u32>,

    /// Seconds a face stays live after its last blink.
    #[arg(long)]
    liveness_timeout: Option<f64>,

    /// Minimum IoU for matching faces across frames.
    #[arg(long)]
    iou_threshold: Option<f64>,

    /// Minimum cosine similarity for an embedding match (-1.0 to 1.0).
    #[arg(long)]
    recognition_threshold: Option<f64>,

    /// Recognizer backend: embedding or command.
    #[arg(long, default_value = "embedding")]
    recognizer: String,

    /// Command for the command backend; `{crop}` and `{gallery}` are
    /// replaced with the crop image and gallery paths.
    #[arg(long)]
    recognizer_command: Option<String>,

    /// Write JSON lines here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only write frames in which a face was reported.
    #[arg(long)]
    only_faces: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Run detection and mesh concurrently.
    #[arg(long)]
    parallel: bool,

    /// Flip frames horizontally (selfie view).
    #[arg(long)]
    mirror: bool,

    /// Write the effective configuration to this file and exit.
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    if let Some(path) = &cli.save_config {
        config.save(path)?;
        log::info!("Config written to {}", path.display());
        return Ok(());
    }

    let models_dir = cli.models_dir.as_deref();
    let detector_model = resolve_model(DETECTOR_MODEL_NAME, None, models_dir)?;
    let mesh_model = resolve_model(MESH_MODEL_NAME, None, models_dir)?;

    let confidence = config.pipeline.min_detection_confidence;
    let detector: Box<dyn FaceDetector> =
        Box::new(OnnxBlazefaceDetector::new(&detector_model, confidence)?);
    let mesher: Box<dyn FaceMesher> = Box::new(OnnxFaceMesher::new(
        &mesh_model,
        Box::new(OnnxBlazefaceDetector::new(&detector_model, confidence)?),
        config.pipeline.max_faces,
        DEFAULT_MIN_PRESENCE,
    )?);
    let recognizer = build_recognizer(&cli, &config, models_dir)?;
    let source: Box<dyn FrameSource> =
        Box::new(FfmpegFrameSource::open(capture_target(&cli), cli.mirror)?);
    let sink = build_sink(&cli)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;

    let report = LivenessGateUseCase::new(source, detector, mesher, recognizer, sink, &config)
        .with_logger(Box::new(StdoutPipelineLogger::default()))
        .with_cancel_flag(cancelled)
        .with_max_frames(cli.max_frames)
        .run()?;

    log::info!("Processed {} frames ({:?})", report.frames, report.stop);
    match report.presence.summary_string() {
        Some(summary) => eprintln!("{summary}"),
        None => eprintln!("No one was admitted"),
    }
    Ok(())
}

/// File (or default) config, then command-line overrides, then validation.
fn load_config(cli: &Cli) -> Result<GateConfig, Box<dyn std::error::Error>> {
    let mut config = GateConfig::load_or_default(cli.config.as_deref())?;
    if let Some(t) = cli.ear_threshold {
        config.liveness.blink_ear_threshold = t;
    }
    if let Some(n) = cli.blink_frames {
        config.liveness.blink_min_frames = n;
    }
    if let Some(s) = cli.liveness_timeout {
        config.liveness.liveness_timeout_seconds = s;
    }
    if let Some(iou) = cli.iou_threshold {
        config.tracker.match_iou_threshold = iou;
        config.tracker.detection_iou_threshold = iou;
    }
    if let Some(t) = cli.recognition_threshold {
        config.pipeline.recognition_threshold = t;
    }
    if cli.parallel {
        config.pipeline.parallel_inference = true;
    }
    config.validate()?;
    Ok(config)
}

fn build_recognizer(
    cli: &Cli,
    config: &GateConfig,
    models_dir: Option<&Path>,
) -> Result<Box<dyn FaceRecognizer>, Box<dyn std::error::Error>> {
    let gallery = Gallery::load_or_empty(&cli.gallery)?;
    log::info!(
        "Gallery {}: {} identit(ies)",
        gallery.root().display(),
        gallery.labels().len()
    );

    if cli.recognizer == "command" {
        let command = cli
            .recognizer_command
            .as_deref()
            .ok_or("--recognizer-command is required with --recognizer command")?;
        return Ok(Box::new(CommandFaceRecognizer::new(command, gallery)?));
    }

    let model = resolve_model(EMBEDDING_MODEL_NAME, Some(EMBEDDING_MODEL_URL), models_dir)?;
    Ok(Box::new(EmbeddingFaceRecognizer::new(
        &model,
        &gallery,
        config.pipeline.recognition_threshold,
    )?))
}

fn build_sink(cli: &Cli) -> Result<Box<dyn FrameSink>, Box<dyn std::error::Error>> {
    Ok(match &cli.output {
        Some(path) => Box::new(JsonLinesFrameSink::create(path)?.only_with_faces(cli.only_faces)),
        None => Box::new(JsonLinesFrameSink::stdout().only_with_faces(cli.only_faces)),
    })
}

fn capture_target(cli: &Cli) -> CaptureTarget {
    match (&cli.input, &cli.device) {
        (Some(path), _) => CaptureTarget::File(path.clone()),
        (None, Some(device)) => CaptureTarget::Device(device.clone()),
        (None, None) => CaptureTarget::Device("0".to_string()),
    }
}

fn resolve_model(
    name: &str,
    url: Option<&str>,
    models_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let progress: Option<model_resolver::ProgressFn> = url.map(|_| {
        let name = name.to_string();
        Box::new(move |downloaded: u64, total: u64| download_progress(&name, downloaded, total))
            as model_resolver::ProgressFn
    });
    let path = model_resolver::resolve(name, url, models_dir, progress)?;
    log::debug!("Using {}", path.display());
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if let Some(dir) = &cli.models_dir {
        if !dir.is_dir() {
            return Err(format!("Models directory not found: {}", dir.display()).into());
        }
    }
    if cli.recognizer != "embedding" && cli.recognizer != "command" {
        return Err(format!(
            "Recognizer must be 'embedding' or 'command', got '{}'",
            cli.recognizer
        )
        .into());
    }
    if cli.recognizer == "command" && cli.recognizer_command.is_none() {
        return Err("--recognizer-command is required with --recognizer command".into());
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    Ok(())
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
