use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use drowsiness_core::detection::domain::fatigue_tracker::FatigueThresholds;
use drowsiness_core::detection::domain::index_groups::IndexGroups;
use drowsiness_core::detection::domain::landmark_source::LandmarkModelLoader;
use drowsiness_core::detection::infrastructure::onnx_face_mesh::{
    OnnxFaceMeshLoader, DEFAULT_PRESENCE_THRESHOLD,
};
use drowsiness_core::detection::infrastructure::replay_landmark_source::{
    read_recording, ReplayLandmarkLoader,
};
use drowsiness_core::pipeline::drowsiness_monitor::{DrowsinessMonitor, FrameOutcome, MonitorConfig};
use drowsiness_core::pipeline::frame_loop::FrameLoop;
use drowsiness_core::pipeline::monitor_logger::StdoutMonitorLogger;
use drowsiness_core::shared::constants::{
    DEFAULT_REFRESH_HZ, EAR_THRESHOLD, FACE_MESH_MODEL_NAME, FATIGUE_FRAMES, MAR_THRESHOLD,
};
use drowsiness_core::shared::model_resolver::ModelLocation;
use drowsiness_core::video::domain::frame_source::FrameSource;
use drowsiness_core::video::infrastructure::blank_frame_source::BlankFrameSource;
use drowsiness_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use drowsiness_core::video::infrastructure::image_sequence_frame_source::ImageSequenceFrameSource;

/// Frame size used when a landmark recording is replayed without video.
const BLANK_FRAME_SIZE: u32 = 64;

/// Drowsiness and yawn detection from facial landmarks.
#[derive(Parser)]
#[command(name = "drowsiness-monitor")]
struct Cli {
    /// Input video file or directory of images (optional with --landmarks).
    input: Option<PathBuf>,

    /// Replay landmarks from a JSON-lines recording instead of running a model.
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Path to a 468-point face-mesh ONNX model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download the face-mesh ONNX model from this URL (cached after first use).
    #[arg(long)]
    model_url: Option<String>,

    /// Minimum face presence score (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_PRESENCE_THRESHOLD)]
    presence_threshold: f64,

    /// Eye aspect ratio below which a frame counts as eyes closed.
    #[arg(long, default_value_t = EAR_THRESHOLD)]
    ear_threshold: f64,

    /// Mouth aspect ratio above which a frame counts as yawning.
    #[arg(long, default_value_t = MAR_THRESHOLD)]
    mar_threshold: f64,

    /// Closed-eye frames that must be exceeded before flagging drowsiness.
    #[arg(long, default_value_t = FATIGUE_FRAMES)]
    fatigue_frames: u32,

    /// JSON file overriding the eye and mouth landmark indices.
    #[arg(long)]
    index_groups: Option<PathBuf>,

    /// Frames processed per second.
    #[arg(long, default_value_t = DEFAULT_REFRESH_HZ)]
    refresh_hz: u32,

    /// Process frames back to back instead of at --refresh-hz.
    #[arg(long)]
    unpaced: bool,

    /// Print the session state as JSON after every measured frame.
    #[arg(long)]
    json: bool,
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

    let config = build_config(&cli)?;
    let (loader, recorded_frames) = build_loader(&cli)?;
    let source = build_frame_source(cli.input.as_deref(), recorded_frames)?;

    let mut monitor = DrowsinessMonitor::new(loader, config)
        .with_logger(Box::new(StdoutMonitorLogger::new()));
    monitor.start_session(source)?;

    let frame_loop = if cli.unpaced {
        FrameLoop::unpaced()
    } else {
        FrameLoop::new(cli.refresh_hz)
    };

    let json = cli.json;
    let frames = frame_loop.run(&mut monitor, |outcome, state| {
        if !json || !matches!(outcome, FrameOutcome::Updated { .. }) {
            return;
        }
        match serde_json::to_string(state) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("Failed to serialize session state: {e}"),
        }
    });

    let state = monitor.state();
    log::info!(
        "Processed {frames} frames (ear {:.3}, mar {:.3}, drowsy {}, yawning {})",
        state.ear,
        state.mar,
        state.is_drowsy,
        state.is_yawning
    );
    Ok(())
}

fn build_config(cli: &Cli) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let index_groups = match &cli.index_groups {
        Some(path) => IndexGroups::load(path)?,
        None => IndexGroups::default(),
    };
    Ok(MonitorConfig {
        thresholds: FatigueThresholds {
            ear_threshold: cli.ear_threshold,
            mar_threshold: cli.mar_threshold,
            fatigue_frames: cli.fatigue_frames,
        },
        index_groups,
    })
}

/// Returns the loader plus, for replays, the number of recorded frames.
fn build_loader(
    cli: &Cli,
) -> Result<(Box<dyn LandmarkModelLoader>, Option<usize>), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.landmarks {
        let frames = read_recording(path)?;
        let count = frames.len();
        return Ok((Box::new(ReplayLandmarkLoader::from_frames(frames)), Some(count)));
    }

    let location = match (&cli.model, &cli.model_url) {
        (Some(path), _) => ModelLocation::File(path.clone()),
        (None, Some(url)) => ModelLocation::Remote {
            name: model_name_from_url(url),
            url: url.clone(),
        },
        (None, None) => return Err("Either --landmarks, --model or --model-url is required".into()),
    };
    log::info!("Landmark model: {location:?}");
    let loader = OnnxFaceMeshLoader::new(location, cli.presence_threshold)
        .with_progress(Box::new(download_progress));
    Ok((Box::new(loader), None))
}

fn build_frame_source(
    input: Option<&Path>,
    recorded_frames: Option<usize>,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    match (input, recorded_frames) {
        (Some(path), _) if path.is_dir() => Ok(Box::new(ImageSequenceFrameSource::new(path))),
        (Some(path), _) => Ok(Box::new(FfmpegFrameSource::new(path))),
        (None, Some(count)) => Ok(Box::new(BlankFrameSource::new(
            BLANK_FRAME_SIZE,
            BLANK_FRAME_SIZE,
            count,
        ))),
        (None, None) => Err("An input video or image directory is required".into()),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input not found: {}", input.display()).into());
        }
    } else if cli.landmarks.is_none() {
        return Err("An input video or image directory is required unless --landmarks is used".into());
    }
    if cli.landmarks.is_some() && (cli.model.is_some() || cli.model_url.is_some()) {
        return Err("--landmarks cannot be combined with --model or --model-url".into());
    }
    if cli.model.is_some() && cli.model_url.is_some() {
        return Err("--model and --model-url are mutually exclusive".into());
    }
    if !(0.0..=1.0).contains(&cli.presence_threshold) {
        return Err(format!(
            "Presence threshold must be between 0.0 and 1.0, got {}",
            cli.presence_threshold
        )
        .into());
    }
    if cli.ear_threshold <= 0.0 {
        return Err(format!("EAR threshold must be positive, got {}", cli.ear_threshold).into());
    }
    if cli.mar_threshold <= 0.0 {
        return Err(format!("MAR threshold must be positive, got {}", cli.mar_threshold).into());
    }
    if cli.refresh_hz == 0 {
        return Err("Refresh rate must be at least 1 Hz".into());
    }
    Ok(())
}

fn model_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|segment| segment.split('?').next().unwrap_or(segment))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FACE_MESH_MODEL_NAME.to_string())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face-mesh model... {pct}%");
    } else {
        eprint!("\rDownloading face-mesh model... {downloaded} bytes");
    }
}
