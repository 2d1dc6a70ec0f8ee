mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use funnyface_core::{
    build_overlays, FeatureSelection, FrameSource, OverlayStyle, RecordedDetector, Size, StyleProfile,
};
use funnyface_hw::{Camera, CameraStream, ImageSequence};
use funnyface_render::{spawn_frame_loop, ApplyOutcome, FrameLoopConfig, LiveRenderer, StillPipeline};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "funnyface", about = "Draw cartoon eyes, mouths and sunglasses over faces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that draws overlays.
#[derive(Args)]
struct OverlayArgs {
    /// Detector recording (JSON) standing in for the vision backend
    #[arg(long)]
    faces: PathBuf,
    /// Comma-separated features: eyes, mouth, sunglasses, or "none"
    #[arg(long)]
    features: Option<FeatureSelection>,
    /// Style profile: still or live
    #[arg(long)]
    style: Option<StyleProfile>,
}

impl OverlayArgs {
    /// Flags win over config; `profile` is the command's own default style.
    fn resolve(&self, config: &Config, profile: StyleProfile) -> (FeatureSelection, OverlayStyle) {
        let selection = self.features.clone().unwrap_or_else(|| config.features.clone());
        let style = OverlayStyle::for_profile(self.style.unwrap_or_else(|| config.style_or(profile)));
        (selection, style)
    }

    fn detector(&self) -> Result<RecordedDetector> {
        RecordedDetector::load(&self.faces)
            .with_context(|| format!("loading face recording {}", self.faces.display()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Overlay features onto a still photo
    Apply {
        /// Input image
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        overlay: OverlayArgs,
        /// Where to write the result
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the overlay primitives for the first recorded frame as JSON
    Plan {
        #[command(flatten)]
        overlay: OverlayArgs,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Run the live overlay pipeline against a camera or an image sequence
    Live {
        #[command(flatten)]
        overlay: OverlayArgs,
        /// V4L2 device (default from config)
        #[arg(long, conflicts_with = "replay")]
        device: Option<String>,
        /// Directory of frames to replay instead of a camera
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<usize>,
        /// Save the final overlay layer as a PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Show camera frames as captured instead of mirrored
        #[arg(long)]
        no_mirror: bool,
    },
    /// List capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Apply { image, overlay, output } => apply(&config, &image, &overlay, &output),
        Commands::Plan { overlay, width, height } => plan(&config, &overlay, width, height),
        Commands::Live {
            overlay,
            device,
            replay,
            frames,
            snapshot,
            no_mirror,
        } => {
            let config = Config {
                mirror: config.mirror && !no_mirror,
                ..config
            };
            live(
                &config,
                &overlay,
                device,
                replay.as_deref(),
                frames,
                snapshot.as_deref(),
            )
            .await
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

fn apply(config: &Config, image: &Path, overlay: &OverlayArgs, output: &Path) -> Result<()> {
    let original = image::open(image)
        .with_context(|| format!("opening {}", image.display()))?
        .to_rgba8();
    let mut detector = overlay.detector()?;
    let (selection, style) = overlay.resolve(config, StyleProfile::Still);

    let mut pipeline = StillPipeline::new(original);
    match pipeline.apply(&mut detector, &selection, &style) {
        ApplyOutcome::Applied { faces, primitives } => {
            println!("{faces} face(s), {primitives} overlay(s)");
        }
        ApplyOutcome::DetectorFailed => println!("Face detection failed; image left unchanged"),
    }

    pipeline
        .displayed()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn plan(config: &Config, overlay: &OverlayArgs, width: u32, height: u32) -> Result<()> {
    let detector = overlay.detector()?;
    let (selection, style) = overlay.resolve(config, StyleProfile::Still);
    let recording = detector.recording();
    let faces = recording.frames.first().map(Vec::as_slice).unwrap_or_default();

    let primitives = build_overlays(
        faces,
        Size::new(width as f32, height as f32),
        recording.convention,
        &selection,
        &style,
    );
    println!("{}", serde_json::to_string_pretty(&primitives)?);
    Ok(())
}

/// Open the camera and start streaming. `None` means there is no usable
/// camera; the caller skips the live preview.
fn open_camera(path: &str, config: &Config) -> Option<(Camera, CameraStream)> {
    let camera = match Camera::open(path, config.capture_width, config.capture_height) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::warn!(device = %path, error = %e, "camera unavailable; live overlay not started");
            return None;
        }
    };
    let mut stream = match camera.stream() {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(device = %path, error = %e, "camera will not stream; live overlay not started");
            return None;
        }
    };
    stream.set_mirrored(config.mirror);
    stream.warm_up(config.warmup_frames);
    Some((camera, stream))
}

async fn live(
    config: &Config,
    overlay: &OverlayArgs,
    device: Option<String>,
    replay: Option<&Path>,
    max_frames: Option<usize>,
    snapshot: Option<&Path>,
) -> Result<()> {
    let detector = overlay.detector()?;
    let (selection, style) = overlay.resolve(config, StyleProfile::Live);

    // Keeps the device open for as long as its stream runs.
    let mut camera_guard: Option<Camera> = None;
    let source: Box<dyn FrameSource + Send> = match replay {
        Some(dir) => Box::new(
            ImageSequence::from_dir(dir).with_context(|| format!("reading frames from {}", dir.display()))?,
        ),
        None => {
            let path = device.unwrap_or_else(|| config.camera_device.clone());
            let Some((camera, stream)) = open_camera(&path, config) else {
                return Ok(());
            };
            camera_guard = Some(camera);
            Box::new(stream)
        }
    };

    let Some((width, height)) = source.dimensions() else {
        bail!("frame source has no frames");
    };

    let renderer = LiveRenderer::new(width, height, selection, style);
    let (frame_loop, updates) = spawn_frame_loop(
        source,
        detector,
        FrameLoopConfig {
            capacity: config.channel_capacity,
            max_frames,
            // Replayed frames are all meant to be seen; a camera keeps only fresh ones.
            discard_late: replay.is_none(),
        },
    )
    .context("spawning frame loop")?;

    let renderer = renderer
        .run(updates, |layer| {
            tracing::debug!(sublayers = layer.len(), "presented overlay layer");
        })
        .await;

    let stats = tokio::task::spawn_blocking(move || frame_loop.join()).await?;
    println!(
        "{} frame(s) rendered, {} skipped, {} late, {} overlay(s) on screen",
        stats.processed,
        stats.skipped,
        stats.late,
        renderer.layer().len()
    );

    drop(camera_guard);

    if let Some(path) = snapshot {
        renderer
            .layer()
            .rasterize()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
