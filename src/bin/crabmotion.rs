//! CrabMotion command line recorder
//!
//! Watches a camera (or a folder of frames) and records a segment per motion
//! event. Ctrl-C, SIGTERM and `q` all stop the run cleanly, finalizing the
//! open segment first.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crabmotion::config::{DetectionStrategy, MotionConfig, SegmentContainer};
use crabmotion::consumer::FrameConsumer;
use crabmotion::preview::{spawn_quit_watcher, PreviewSink};
use crabmotion::recording::{next_free_index, writer_for, SegmentRecorder};
use crabmotion::source::{CameraSource, FrameSource, ImageSequenceSource};
use crabmotion::{MotionPipeline, RecordingController, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContainerArg {
    Avi,
    Mp4,
}

impl From<ContainerArg> for SegmentContainer {
    fn from(arg: ContainerArg) -> Self {
        match arg {
            ContainerArg::Avi => SegmentContainer::Avi,
            ContainerArg::Mp4 => SegmentContainer::Mp4,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "crabmotion", version, about = "Record video segments when motion is detected")]
struct Cli {
    /// Camera device index
    #[arg(short = 'c', long = "camera")]
    camera: Option<u32>,

    /// Motion score threshold (lower is more sensitive)
    #[arg(short = 't', long = "threshold")]
    threshold: Option<u64>,

    /// Frames to keep recording after motion stops
    #[arg(short = 'b', long = "buffer")]
    buffer: Option<u32>,

    /// Output directory for recordings
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Run headless without preview snapshots
    #[arg(long = "no-preview")]
    no_preview: bool,

    /// TOML configuration file (defaults to ./crabmotion.toml when present)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Replay images from a directory instead of opening a camera
    #[arg(long = "replay", value_name = "DIR")]
    replay: Option<PathBuf>,

    /// Compare against a running-average background instead of the previous frame
    #[arg(long = "background")]
    background: bool,

    /// Segment container
    #[arg(long = "container", value_enum)]
    container: Option<ContainerArg>,

    /// Playback rate for segment headers (defaults to the source's rate)
    #[arg(long = "fps")]
    fps: Option<f64>,

    /// Replay images at the playback rate instead of as fast as they decode
    #[arg(long = "pace", requires = "replay")]
    pace: bool,

    /// Stop after this many frames
    #[arg(long = "max-frames")]
    max_frames: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long = "json")]
    json: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long = "write-config", value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut MotionConfig) {
        if let Some(camera) = self.camera {
            config.camera.device_id = camera;
        }
        if let Some(threshold) = self.threshold {
            config.detection.threshold = threshold;
        }
        if let Some(buffer) = self.buffer {
            config.recording.buffer_frames = buffer;
        }
        if let Some(output) = &self.output {
            config.recording.output_directory = output.clone();
        }
        if self.no_preview {
            config.preview.enabled = false;
        }
        if self.background {
            config.detection.strategy = DetectionStrategy::AccumulatingBackground;
        }
        if let Some(container) = self.container {
            config.recording.container = container.into();
        }
        if let Some(fps) = self.fps {
            config.recording.fps = Some(fps);
        }
    }
}

fn main() {
    crabmotion::init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => MotionConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MotionConfig::load_or_default(),
    };
    cli.apply_overrides(&mut config);
    config.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;

    if let Some(path) = &cli.write_config {
        config.save_to_file(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .context("installing signal handler")?;

    let source: Box<dyn FrameSource> = match &cli.replay {
        Some(dir) => {
            let replay = ImageSequenceSource::open(dir)?
                .with_frame_rate(config.recording.playback_fps(None));
            Box::new(if cli.pace { replay.paced() } else { replay })
        }
        None => Box::new(CameraSource::open(&config.camera)?),
    };
    let fps = config.recording.playback_fps(source.frame_rate());
    log::info!("Segments play back at {} fps", fps);

    let output = Path::new(&config.recording.output_directory);
    let start_index = if config.recording.continue_numbering {
        next_free_index(output)
    } else {
        0
    };
    if start_index > 0 {
        log::info!("Continuing numbering at recording_{:04}", start_index);
    }

    let recorder = SegmentRecorder::new(writer_for(&config.recording, fps)?)
        .with_stamped_frames(config.recording.stamp_recordings);

    let mut pipeline = MotionPipeline::new(source, &config).with_controller(
        RecordingController::with_start_index(config.recording.buffer_frames, start_index),
    );
    pipeline.attach(Box::new(recorder));

    // the recorder goes first so a refused segment is never previewed as recording
    if config.preview.enabled {
        pipeline.attach(open_preview(output, &stop)?);
    }

    let summary = pipeline.run(&stop, cli.max_frames)?;
    print_summary(&summary, cli.json)
}

#[cfg(feature = "preview")]
fn open_preview(output: &Path, stop: &Arc<AtomicBool>) -> Result<Box<dyn FrameConsumer>> {
    match crabmotion::preview::WindowPreview::new(stop.clone()) {
        Ok(window) => Ok(Box::new(window)),
        Err(e) => {
            log::warn!("No preview window ({}), falling back to snapshots", e);
            open_snapshots(output, stop)
        }
    }
}

#[cfg(not(feature = "preview"))]
fn open_preview(output: &Path, stop: &Arc<AtomicBool>) -> Result<Box<dyn FrameConsumer>> {
    open_snapshots(output, stop)
}

fn open_snapshots(output: &Path, stop: &Arc<AtomicBool>) -> Result<Box<dyn FrameConsumer>> {
    let preview = PreviewSink::new(output.join("preview"))?;
    println!(
        "Preview: {} (type q + Enter to quit)",
        preview.live_path().display()
    );
    spawn_quit_watcher(stop.clone());
    Ok(Box::new(preview))
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "Processed {} frames ({} with motion), stopped: {:?}",
        summary.frames_processed, summary.motion_frames, summary.stop_reason
    );
    for session in &summary.sessions {
        println!(
            "  {} - {} frames, {:.1}s, {} bytes",
            session.path.display(),
            session.frames,
            session.duration_secs,
            session.bytes_written
        );
    }
    if summary.session_errors > 0 {
        println!("  {} recording session(s) failed", summary.session_errors);
    }
    Ok(())
}
