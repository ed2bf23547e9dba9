//! The recorder seam and a recorder built on the encoder engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use shutter_capture::{SurfaceAllocator, SurfaceHandle};
use shutter_encoder::{EncoderEngine, FileSink, PassthroughEncoder, StopListener, TrackEncoder, TrackFormat};
use shutter_ipc::{Size, StopReason, VideoRequest};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::EngineResult;

/// How a recording ended.
#[derive(Debug, Clone)]
pub struct RecorderOutcome {
    pub output: PathBuf,
    pub reason: StopReason,

    /// Finalization error, if the container could not be written.
    pub error: Option<String>,
}

/// Called exactly once per prepared recording, from any thread.
pub type RecorderCallback = Box<dyn FnOnce(RecorderOutcome) + Send>;

/// Consumes the frames rendered into the recording surface.
pub trait VideoRecorder: Send {
    /// Get ready to record `request` at `size`. Returns the surface the
    /// device should render into.
    fn prepare(
        &mut self,
        request: &VideoRequest,
        size: Size,
        on_end: RecorderCallback,
    ) -> EngineResult<SurfaceHandle>;

    /// Start consuming frames.
    fn start(&mut self) -> EngineResult<()>;

    /// A frame was rendered into the surface.
    fn frame_available(&mut self);

    /// Stop recording. The prepared callback follows once the output is
    /// finalized.
    fn stop(&mut self);
}

/// Bytes of silence per audio chunk.
const AUDIO_CHUNK: usize = 1_024;

/// Video keyframe interval in frames.
const KEYFRAME_INTERVAL: u64 = 30;

/// Records into a framed container through the per-track encoder engine.
///
/// The device surface is opaque here, so each rendered frame becomes one
/// video sample stamped with the stream clock, plus one audio chunk when
/// audio is enabled.
pub struct MuxingRecorder {
    allocator: SurfaceAllocator,
    engine: Option<EncoderEngine>,
    on_end: Arc<Mutex<Option<RecorderCallback>>>,
    output: PathBuf,
    audio: bool,
    start_time: Option<Instant>,
    frames: u64,
}

impl MuxingRecorder {
    pub fn new() -> Self {
        Self {
            allocator: SurfaceAllocator::starting_at(5_000),
            engine: None,
            on_end: Arc::new(Mutex::new(None)),
            output: PathBuf::new(),
            audio: false,
            start_time: None,
            frames: 0,
        }
    }

    /// End a recording that never reached the encoder threads.
    fn abandon(&mut self, error: &str) {
        let callback = self.on_end.lock().take();
        if let Some(callback) = callback {
            callback(RecorderOutcome {
                output: self.output.clone(),
                reason: StopReason::User,
                error: Some(error.to_string()),
            });
        }
    }

    fn feed(&mut self, track: usize, data: Bytes, pts_us: u64) {
        let Some(engine) = &self.engine else { return };
        match engine.feed(track, data, pts_us) {
            Ok(true) => {}
            Ok(false) => debug!(track, pts_us, "Sample dropped, track busy"),
            Err(e) => warn!(track, error = %e, "Failed to feed sample"),
        }
    }
}

impl Default for MuxingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoRecorder for MuxingRecorder {
    fn prepare(
        &mut self,
        request: &VideoRequest,
        size: Size,
        on_end: RecorderCallback,
    ) -> EngineResult<SurfaceHandle> {
        if self.on_end.lock().is_some() {
            return Err(EngineError::Video("recorder is busy".into()));
        }
        if let Some(mut previous) = self.engine.take() {
            previous.join();
        }
        self.start_time = None;

        let mut encoders: Vec<Box<dyn TrackEncoder>> = vec![Box::new(PassthroughEncoder::new(
            TrackFormat::video(request.video_bitrate_bps),
            KEYFRAME_INTERVAL,
        ))];
        if request.audio {
            encoders.push(Box::new(PassthroughEncoder::new(
                TrackFormat::audio(request.audio_bitrate_bps),
                1,
            )));
        }

        *self.on_end.lock() = Some(on_end);
        let slot = Arc::clone(&self.on_end);
        let output = request.output.clone();
        let listener: StopListener = Box::new(move |reason, error| {
            let callback = slot.lock().take();
            if let Some(callback) = callback {
                callback(RecorderOutcome {
                    output,
                    reason,
                    error: error.map(|e| e.to_string()),
                });
            }
        });

        self.engine = Some(EncoderEngine::new(
            encoders,
            Box::new(FileSink::new(&request.output)),
            request.max_duration_ms,
            request.max_size_bytes,
            listener,
        ));
        self.output = request.output.clone();
        self.audio = request.audio;
        self.frames = 0;

        info!(
            output = %request.output.display(),
            width = size.width,
            height = size.height,
            audio = request.audio,
            "Recorder prepared"
        );
        Ok(self.allocator.allocate())
    }

    fn start(&mut self) -> EngineResult<()> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| EngineError::Video("recorder not prepared".into()))?;
        engine
            .start()
            .map_err(|e| EngineError::Video(e.to_string()))?;
        self.start_time = Some(Instant::now());
        Ok(())
    }

    fn frame_available(&mut self) {
        let Some(start_time) = self.start_time else { return };
        // PTS from the stream clock, not the device timestamp.
        let pts_us = start_time.elapsed().as_micros() as u64;
        let frame = self.frames;
        self.frames += 1;

        self.feed(0, Bytes::copy_from_slice(&frame.to_be_bytes()), pts_us);
        if self.audio {
            self.feed(1, Bytes::from(vec![0u8; AUDIO_CHUNK]), pts_us);
        }
    }

    fn stop(&mut self) {
        match self.start_time.take() {
            Some(_) => {
                if let Some(engine) = &self.engine {
                    engine.stop();
                }
            }
            None => {
                self.engine = None;
                self.abandon("recording never started");
            }
        }
    }
}
