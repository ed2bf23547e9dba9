//! Runs one encoder thread per track against a shared controller.

use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::controller::{MultiplexController, StopListener, StopPlan};
use crate::sink::ContainerSink;
use crate::{EncodedSample, EncoderError, EncoderResult, TrackEncoder, SAMPLE_CHANNEL_CAPACITY};

/// A raw sample waiting for its track's encoder.
struct RawSample {
    data: Bytes,
    pts_us: u64,
}

struct Track {
    samples_tx: Sender<RawSample>,
    pending: Option<(Box<dyn TrackEncoder>, Receiver<RawSample>, Receiver<()>)>,
}

/// Multi-track encoder feeding one container.
///
/// Tracks request a start on their first encoded sample and drop samples
/// until every track did. A track requests a stop once its samples pass the
/// deadline of the [`StopPlan`], and releases after flushing.
pub struct EncoderEngine {
    controller: Arc<MultiplexController>,
    tracks: Vec<Track>,
    threads: Vec<JoinHandle<()>>,
}

impl EncoderEngine {
    /// Create an engine over `encoders`, one track each.
    pub fn new(
        encoders: Vec<Box<dyn TrackEncoder>>,
        sink: Box<dyn ContainerSink>,
        max_duration_ms: u64,
        max_size_bytes: u64,
        listener: StopListener,
    ) -> Self {
        let total_bitrate: u64 = encoders.iter().map(|e| e.format().bitrate_bps).sum();
        let plan = StopPlan::compute(max_duration_ms, max_size_bytes, total_bitrate);

        let mut tracks = Vec::with_capacity(encoders.len());
        let mut stop_senders = Vec::with_capacity(encoders.len());
        for encoder in encoders {
            let (samples_tx, samples_rx) = bounded(SAMPLE_CHANNEL_CAPACITY);
            let (stop_tx, stop_rx) = unbounded();
            stop_senders.push(stop_tx);
            tracks.push(Track {
                samples_tx,
                pending: Some((encoder, samples_rx, stop_rx)),
            });
        }

        let stop_all = Box::new(move || {
            for stop_tx in &stop_senders {
                let _ = stop_tx.send(());
            }
        });
        let controller = Arc::new(MultiplexController::new(
            tracks.len(),
            plan,
            sink,
            stop_all,
            listener,
        ));

        Self {
            controller,
            tracks,
            threads: Vec::new(),
        }
    }

    pub fn controller(&self) -> &Arc<MultiplexController> {
        &self.controller
    }

    /// Spawn the track threads. Calling it twice has no effect.
    #[instrument(name = "encoder_start", skip(self))]
    pub fn start(&mut self) -> EncoderResult<()> {
        for (index, track) in self.tracks.iter_mut().enumerate() {
            let Some((encoder, samples_rx, stop_rx)) = track.pending.take() else {
                continue;
            };
            let controller = Arc::clone(&self.controller);
            let deadline_us = self.controller.plan().deadline_ms.map(|ms| ms * 1_000);
            let handle = std::thread::Builder::new()
                .name(format!("encoder-track-{index}"))
                .spawn(move || {
                    TrackLoop::new(encoder, controller, deadline_us).run(samples_rx, stop_rx)
                })
                .map_err(|e| EncoderError::Encoding(format!("failed to spawn track: {e}")))?;
            self.threads.push(handle);
        }
        info!(tracks = self.tracks.len(), "Encoder engine started");
        Ok(())
    }

    /// Queue a raw sample for `track`. Returns false if it was dropped.
    pub fn feed(&self, track: usize, data: Bytes, pts_us: u64) -> EncoderResult<bool> {
        let track_ref = self
            .tracks
            .get(track)
            .ok_or(EncoderError::UnknownTrack(track))?;
        if self.threads.is_empty() {
            return Err(EncoderError::NotStarted);
        }
        match track_ref.samples_tx.try_send(RawSample { data, pts_us }) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                trace!(track, "Sample queue full, dropping sample");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Ok(false),
        }
    }

    /// Stop every track on behalf of the caller.
    pub fn stop(&self) {
        self.controller.stop_by_user();
    }

    /// Wait for every track thread to exit.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("Encoder track thread panicked");
            }
        }
    }
}

struct TrackLoop {
    encoder: Box<dyn TrackEncoder>,
    controller: Arc<MultiplexController>,
    deadline_us: Option<u64>,
    track: Option<usize>,
    first_pts_us: Option<u64>,
    stop_requested: bool,
}

impl TrackLoop {
    fn new(
        encoder: Box<dyn TrackEncoder>,
        controller: Arc<MultiplexController>,
        deadline_us: Option<u64>,
    ) -> Self {
        Self {
            encoder,
            controller,
            deadline_us,
            track: None,
            first_pts_us: None,
            stop_requested: false,
        }
    }

    #[instrument(name = "encoder_track", skip_all, fields(encoder = self.encoder.name()))]
    fn run(mut self, samples_rx: Receiver<RawSample>, stop_rx: Receiver<()>) {
        debug!("Track loop started");
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(samples_rx) -> msg => match msg {
                    Ok(raw) => match self.encoder.encode(&raw.data, raw.pts_us) {
                        Ok(Some(sample)) => self.handle(sample),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Failed to encode sample"),
                    },
                    Err(_) => break,
                },
            }
        }

        match self.encoder.flush() {
            Ok(samples) => {
                for sample in samples {
                    self.handle(sample);
                }
            }
            Err(e) => warn!(error = %e, "Failed to flush encoder"),
        }

        let track = self.track.unwrap_or(usize::MAX);
        debug!(track, "Track loop finished");
        self.controller.request_release(track);
    }

    fn handle(&mut self, sample: EncodedSample) {
        let track = match self.track {
            Some(track) => track,
            None => match self.controller.request_start(self.encoder.format().clone()) {
                Ok(track) => {
                    self.track = Some(track);
                    track
                }
                Err(e) => {
                    error!(error = %e, "Track could not join the container");
                    return;
                }
            },
        };

        if !self.controller.is_open() {
            trace!(track, pts_us = sample.pts_us, "Container not open, dropping sample");
            return;
        }

        if let Err(e) = self.controller.write(track, &sample) {
            warn!(track, error = %e, "Failed to write sample");
            return;
        }

        let first = *self.first_pts_us.get_or_insert(sample.pts_us);
        if let Some(deadline_us) = self.deadline_us {
            if !self.stop_requested && sample.pts_us.saturating_sub(first) >= deadline_us {
                self.stop_requested = true;
                self.controller.request_stop(track);
            }
        }
    }
}
