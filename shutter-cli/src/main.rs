//! Command-line driver for the shutter capture engine.
//!
//! Opens a simulated device, meters once, then takes a picture or records a
//! short clip depending on the configured mode, and shuts down. An optional
//! JSON config file path may be passed as the only argument.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Receiver;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shutter_capture::{AeState, AfState, AwbState, CaptureResult, DeviceCharacteristics, PreviewSurface};
use shutter_engine::sim::{SimController, SimulatedDevice, StaticPreview};
use shutter_engine::{create_engine, Engine, MuxingRecorder, Surfaces};
use shutter_ipc::{EngineConfig, EngineEvent, MeteringTrigger, Mode, PointF, Size, VideoRequest};

/// How long to wait for a picture or video result.
const RESULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between simulated frames while recording.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Everything the run can be configured with.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RunConfig {
    engine: EngineConfig,
    video: VideoRequest,

    /// Metering point in normalized coordinates; the frame center if unset.
    metering_point: Option<PointF>,

    /// Frames to record in Video mode.
    frames: u32,

    /// Size of the simulated preview view.
    view: Size,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            video: VideoRequest::default(),
            metering_point: None,
            frames: 90,
            view: Size::new(1920, 1080),
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "shutter=debug,shutter_engine=debug,shutter_action=debug,shutter_encoder=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(RunConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Log whatever the engine reported so far.
fn log_events(events: &Receiver<EngineEvent>) {
    for event in events.try_iter() {
        log_event(&event);
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Error {
            recoverable: false,
            message,
        } => error!(message = %message, "Engine error"),
        EngineEvent::Error { message, .. } => warn!(message = %message, "Engine warning"),
        other => debug!(event = ?other, "Engine event"),
    }
}

/// Wait for the first event `matches` accepts, logging the others.
fn wait_for_event(
    events: &Receiver<EngineEvent>,
    mut matches: impl FnMut(&EngineEvent) -> bool,
) -> Result<EngineEvent> {
    let deadline = Instant::now() + RESULT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .context("Timed out waiting for the engine")?;
        if matches(&event) {
            return Ok(event);
        }
        log_event(&event);
    }
}

fn meter(engine: &Engine, sim: &SimController, point: Option<PointF>) -> Result<()> {
    engine
        .start_metering(point, MeteringTrigger::Api)
        .wait()
        .context("Failed to start metering")?;
    sim.emit_result(
        CaptureResult::default()
            .with_af(AfState::ActiveScan)
            .with_ae(AeState::Searching)
            .with_awb(AwbState::Searching),
    );
    sim.emit_result(
        CaptureResult::default()
            .with_af(AfState::FocusedLocked)
            .with_ae(AeState::Converged)
            .with_awb(AwbState::Converged),
    );
    engine.sync()?;
    Ok(())
}

fn take_picture(engine: &Engine, events: &Receiver<EngineEvent>) -> Result<()> {
    engine.take_picture().wait().context("Failed to take picture")?;
    let event = wait_for_event(events, |e| matches!(e, EngineEvent::PictureResult { .. }))?;
    let EngineEvent::PictureResult { result } = event else {
        bail!("Unexpected engine event");
    };
    let picture = result.map_err(|e| anyhow!("Picture failed: {e}"))?;
    info!(
        width = picture.size.width,
        height = picture.size.height,
        bytes = picture.data.len(),
        "Picture taken"
    );
    Ok(())
}

fn record(
    engine: &Engine,
    sim: &SimController,
    events: &Receiver<EngineEvent>,
    request: VideoRequest,
    frames: u32,
) -> Result<PathBuf> {
    engine
        .take_video(request)
        .wait()
        .context("Failed to start recording")?;
    for _ in 0..frames {
        if sim.emit_frames(1) == 0 {
            break;
        }
        thread::sleep(FRAME_INTERVAL);
        log_events(events);
    }
    engine.stop_video().wait()?;

    let event = wait_for_event(events, |e| matches!(e, EngineEvent::VideoResult { .. }))?;
    let EngineEvent::VideoResult { result } = event else {
        bail!("Unexpected engine event");
    };
    let video = result.map_err(|e| anyhow!("Video failed: {e}"))?;
    info!(output = %video.output.display(), reason = ?video.reason, "Video saved");
    Ok(video.output)
}

fn run(config: RunConfig) -> Result<()> {
    let (device, sim) = SimulatedDevice::new(DeviceCharacteristics::default());
    let preview: Arc<dyn PreviewSurface> = Arc::new(StaticPreview::new(config.view));
    let surfaces = Surfaces::new(preview).with_recorder(Box::new(MuxingRecorder::new()));
    let mode = config.engine.mode;
    let (engine, events) = create_engine(config.engine, Box::new(device), surfaces)
        .context("Failed to create engine")?;

    engine.start().wait().context("Failed to start engine")?;
    info!(states = ?engine.stage_states(), "Engine started");
    log_events(&events);

    meter(&engine, &sim, config.metering_point)?;
    log_events(&events);

    match mode {
        Mode::Picture => take_picture(&engine, &events)?,
        Mode::Video => {
            let output = record(&engine, &sim, &events, config.video, config.frames)?;
            let size = std::fs::metadata(&output)
                .with_context(|| format!("Failed to stat {}", output.display()))?
                .len();
            info!(output = %output.display(), bytes = size, "Container written");
        }
    }

    engine.stop().wait().context("Failed to stop engine")?;
    log_events(&events);
    info!(parameters = ?engine.parameters(), "Engine stopped");
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    info!("Shutter starting");

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(path.as_deref())?;
    run(config)
}
