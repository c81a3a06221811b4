use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use marker_views::config::{load_camera_intrinsics, load_detector_params};
use marker_views::replay::{Recording, ReplayBackend, ReplaySource};
use marker_views::{
    CameraMode, DrawCommand, InputEvent, Key, MarkerPipeline, RecordingRenderer, Result, Viewer,
    ViewerConfig,
};

/// Replay a recorded marker session and log the draw calls of every frame.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Recorded session (JSON).
    #[arg(long)]
    recording: PathBuf,
    /// Marker detector parameters (JSON). Defaults are used if missing.
    #[arg(long, default_value = "detector_params.json")]
    detector_params: PathBuf,
    /// Camera calibration (JSON).
    #[arg(long, default_value = "camera.json")]
    camera: PathBuf,
    /// Viewer settings (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Marker dictionary name, overriding the viewer settings.
    #[arg(long)]
    dictionary: Option<String>,
    /// Scripted input events (JSON list of `{ "frame": n, "event": ... }`).
    #[arg(long)]
    events: Option<PathBuf>,
    /// Initial viewing mode.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    mode: u8,
    /// Stop after this many ticks.
    #[arg(long)]
    frames: Option<u64>,
    /// Log every draw call.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct ScriptedEvent {
    frame: u64,
    event: InputEvent,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => read_json::<ViewerConfig>(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(name) = &args.dictionary {
        config.dictionary = name.parse()?;
    }

    let params = load_detector_params(&args.detector_params)?;
    let intrinsics = load_camera_intrinsics(&args.camera)?;
    let recording = Recording::from_path(&args.recording)?;
    let mut events: Vec<ScriptedEvent> = match &args.events {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    events.sort_by_key(|e| e.frame);
    log::info!(
        "replaying {} frames from '{}' with {}",
        recording.frames.len(),
        args.recording.display(),
        config.dictionary.name()
    );

    let pipeline = MarkerPipeline::new(
        ReplaySource::new(recording),
        ReplayBackend::default(),
        config.dictionary,
        params,
        intrinsics,
    )
    .with_marker_length(config.marker_length);
    let mut viewer = Viewer::new(pipeline, &config);

    let mode = CameraMode::try_from(args.mode)?;
    viewer.handle_event(InputEvent::KeyDown(Key::Digit(args.mode + 1)));
    log::info!("starting in {mode:?}");

    let mut events = events.into_iter().peekable();
    let mut renderer = RecordingRenderer::default();
    let mut tick = 0;
    while !viewer.pipeline().source().is_exhausted() && args.frames.map_or(true, |n| tick < n) {
        while let Some(scripted) = events.next_if(|e| e.frame <= tick) {
            viewer.handle_event(scripted.event);
        }

        if viewer.update()? {
            viewer.render(&mut renderer);
            let commands = renderer.take();
            let boxes = commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::DrawBox(_)))
                .count();
            log::info!(
                "tick {tick}: {:?}, {} markers, {boxes} boxes",
                viewer.state().mode,
                viewer.markers().len()
            );
            for command in &commands {
                log::debug!("  {command:?}");
            }
        } else {
            log::info!("tick {tick}: capture failed");
        }
        tick += 1;
    }

    Ok(())
}
