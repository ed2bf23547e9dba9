//! The barrier that lets independent tracks share one container.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use shutter_ipc::StopReason;
use tracing::{debug, error, info, warn};

use crate::error::EncoderError;
use crate::sink::ContainerSink;
use crate::{EncodedSample, EncoderResult, TrackFormat};

/// Told once the container was finalized, with the finalization error if any.
pub type StopListener = Box<dyn FnOnce(StopReason, Option<EncoderError>) + Send>;

/// Asks every track to stop.
pub type StopAll = Box<dyn Fn() + Send + Sync>;

/// Recording limit derived from the duration and size budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPlan {
    /// Effective duration limit, if any.
    pub deadline_ms: Option<u64>,

    /// Reason recorded if the tracks stop on their own.
    pub possible_reason: StopReason,
}

impl StopPlan {
    /// Combine a duration and a size budget (0 meaning unlimited) into one
    /// duration limit, estimating the size limit from the total bitrate.
    pub fn compute(max_duration_ms: u64, max_size_bytes: u64, total_bitrate_bps: u64) -> Self {
        let size_ms = if max_size_bytes > 0 && total_bitrate_bps > 0 {
            let ms = max_size_bytes as u128 * 8 * 1000 / total_bitrate_bps as u128;
            Some(u64::try_from(ms).unwrap_or(u64::MAX))
        } else {
            None
        };
        let duration_ms = (max_duration_ms > 0).then_some(max_duration_ms);

        let (deadline_ms, possible_reason) = match (duration_ms, size_ms) {
            (Some(duration), Some(size)) if size < duration => (Some(size), StopReason::MaxSize),
            (Some(duration), _) => (Some(duration), StopReason::MaxDuration),
            (None, Some(size)) => (Some(size), StopReason::MaxSize),
            (None, None) => (None, StopReason::MaxDuration),
        };

        Self {
            deadline_ms,
            possible_reason,
        }
    }
}

struct Barrier {
    formats: Vec<TrackFormat>,
    stop_requests: usize,
    released: usize,
    stop_reason: Option<StopReason>,
    listener: Option<StopListener>,
}

/// Coordinates `total_tracks` tracks writing into one container.
///
/// The container opens on the last `request_start` and is finalized on the
/// last `request_release`. The three barrier operations share one lock;
/// `write` only checks the open flag.
pub struct MultiplexController {
    total_tracks: usize,
    plan: StopPlan,
    barrier: Mutex<Barrier>,
    open: AtomicBool,
    samples_written: AtomicU64,
    sink: Mutex<Box<dyn ContainerSink>>,
    stop_all: StopAll,
}

impl MultiplexController {
    pub fn new(
        total_tracks: usize,
        plan: StopPlan,
        sink: Box<dyn ContainerSink>,
        stop_all: StopAll,
        listener: StopListener,
    ) -> Self {
        debug!(
            total_tracks,
            deadline_ms = ?plan.deadline_ms,
            possible_reason = ?plan.possible_reason,
            "Creating multiplex controller"
        );
        Self {
            total_tracks,
            plan,
            barrier: Mutex::new(Barrier {
                formats: Vec::with_capacity(total_tracks),
                stop_requests: 0,
                released: 0,
                stop_reason: None,
                listener: Some(listener),
            }),
            open: AtomicBool::new(false),
            samples_written: AtomicU64::new(0),
            sink: Mutex::new(sink),
            stop_all,
        }
    }

    pub fn plan(&self) -> StopPlan {
        self.plan
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Samples accepted so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    /// The recorded stop reason, once a stop was decided.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.barrier.lock().stop_reason
    }

    /// Register a track. The container opens when the last track registers.
    pub fn request_start(&self, format: TrackFormat) -> EncoderResult<usize> {
        let mut barrier = self.barrier.lock();
        if barrier.formats.len() == self.total_tracks {
            return Err(EncoderError::AlreadyOpen);
        }

        let track = barrier.formats.len();
        debug!(track, mime = %format.mime, "Track requested start");
        barrier.formats.push(format);

        if barrier.formats.len() == self.total_tracks {
            self.sink.lock().start(&barrier.formats)?;
            self.open.store(true, Ordering::Release);
            info!(tracks = self.total_tracks, "Container opened");
        }
        Ok(track)
    }

    /// Write a sample. Rejected until the container is open.
    pub fn write(&self, track: usize, sample: &EncodedSample) -> EncoderResult<()> {
        if !self.is_open() {
            return Err(EncoderError::WriteBeforeOpen { track });
        }
        if track >= self.total_tracks {
            return Err(EncoderError::UnknownTrack(track));
        }
        self.sink.lock().write(track, sample)?;
        self.samples_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// A track reached its deadline. When every track has, the recording
    /// stops with the precomputed reason.
    pub fn request_stop(&self, track: usize) {
        let stop = {
            let mut barrier = self.barrier.lock();
            barrier.stop_requests += 1;
            debug!(track, requests = barrier.stop_requests, "Track requested stop");
            if barrier.stop_requests == self.total_tracks {
                let reason = *barrier.stop_reason.get_or_insert(self.plan.possible_reason);
                info!(reason = ?reason, "All tracks requested stop");
                true
            } else {
                false
            }
        };
        if stop {
            (self.stop_all)();
        }
    }

    /// Stop every track on behalf of the caller.
    pub fn stop_by_user(&self) {
        {
            let mut barrier = self.barrier.lock();
            barrier.stop_reason.get_or_insert(StopReason::User);
        }
        info!("Recording stopped by user");
        (self.stop_all)();
    }

    /// A track is fully torn down. The last release finalizes the container
    /// and notifies the listener.
    pub fn request_release(&self, track: usize) {
        let (reason, listener) = {
            let mut barrier = self.barrier.lock();
            barrier.released += 1;
            debug!(track, released = barrier.released, "Track released");
            if barrier.released != self.total_tracks {
                return;
            }
            let Some(listener) = barrier.listener.take() else {
                return;
            };
            (barrier.stop_reason.unwrap_or_default(), listener)
        };

        let error = self.finalize();
        match &error {
            Some(e) => warn!(error = %e, "Container finalized with error"),
            None => info!(reason = ?reason, "Container finalized"),
        }
        listener(reason, error);
    }

    fn finalize(&self) -> Option<EncoderError> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Some(EncoderError::Finalize("container was never opened".into()));
        }
        if let Err(e) = self.sink.lock().finish() {
            error!(error = %e, "Failed to finish container");
            return Some(EncoderError::Finalize(e.to_string()));
        }
        if self.samples_written.load(Ordering::Relaxed) == 0 {
            return Some(EncoderError::Finalize("no samples were written".into()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn sample(pts_us: u64) -> EncodedSample {
        EncodedSample {
            data: Bytes::from_static(&[1, 2, 3]),
            pts_us,
            is_keyframe: true,
        }
    }

    struct Harness {
        controller: MultiplexController,
        sink: MemorySink,
        stop_calls: Arc<AtomicUsize>,
        outcome: Arc<Mutex<Option<(StopReason, Option<String>)>>>,
    }

    fn harness(tracks: usize, plan: StopPlan) -> Harness {
        let sink = MemorySink::new();
        let stop_calls = Arc::new(AtomicUsize::new(0));
        let outcome = Arc::new(Mutex::new(None));

        let calls = Arc::clone(&stop_calls);
        let result = Arc::clone(&outcome);
        let controller = MultiplexController::new(
            tracks,
            plan,
            Box::new(sink.clone()),
            Box::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |reason, error| {
                *result.lock() = Some((reason, error.map(|e| e.to_string())));
            }),
        );
        Harness {
            controller,
            sink,
            stop_calls,
            outcome,
        }
    }

    #[test]
    fn test_stop_plan_prefers_tighter_size() {
        // 1 Mbps for 8 seconds is 1,000,000 bytes.
        let plan = StopPlan::compute(10_000, 1_000_000, 1_000_000);
        assert_eq!(plan.possible_reason, StopReason::MaxSize);
        assert_eq!(plan.deadline_ms, Some(8_000));
    }

    #[test]
    fn test_stop_plan_prefers_tighter_duration() {
        let plan = StopPlan::compute(5_000, 1_000_000, 1_000_000);
        assert_eq!(plan.possible_reason, StopReason::MaxDuration);
        assert_eq!(plan.deadline_ms, Some(5_000));
    }

    #[test]
    fn test_stop_plan_single_limits() {
        let size_only = StopPlan::compute(0, 250_000, 1_000_000);
        assert_eq!(size_only.possible_reason, StopReason::MaxSize);
        assert_eq!(size_only.deadline_ms, Some(2_000));

        let duration_only = StopPlan::compute(3_000, 0, 1_000_000);
        assert_eq!(duration_only.possible_reason, StopReason::MaxDuration);
        assert_eq!(duration_only.deadline_ms, Some(3_000));

        assert_eq!(StopPlan::compute(0, 0, 1_000_000).deadline_ms, None);
    }

    #[test]
    fn test_opens_on_last_start() {
        let h = harness(2, StopPlan::compute(0, 0, 0));

        assert_eq!(h.controller.request_start(TrackFormat::video(1)).unwrap(), 0);
        assert!(!h.controller.is_open());
        assert!(matches!(
            h.controller.write(0, &sample(0)),
            Err(EncoderError::WriteBeforeOpen { track: 0 })
        ));
        assert!(!h.sink.container().lock().started);

        assert_eq!(h.controller.request_start(TrackFormat::audio(1)).unwrap(), 1);
        assert!(h.controller.is_open());
        assert!(h.sink.container().lock().started);
        h.controller.write(1, &sample(0)).unwrap();

        assert!(matches!(
            h.controller.request_start(TrackFormat::audio(1)),
            Err(EncoderError::AlreadyOpen)
        ));
        assert!(matches!(
            h.controller.write(2, &sample(0)),
            Err(EncoderError::UnknownTrack(2))
        ));
    }

    #[test]
    fn test_stop_all_on_last_stop_request() {
        let h = harness(2, StopPlan::compute(10_000, 1_000_000, 1_000_000));
        h.controller.request_start(TrackFormat::video(1)).unwrap();
        h.controller.request_start(TrackFormat::audio(1)).unwrap();

        h.controller.request_stop(0);
        assert_eq!(h.stop_calls.load(Ordering::SeqCst), 0);
        h.controller.request_stop(1);
        assert_eq!(h.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.stop_reason(), Some(StopReason::MaxSize));
    }

    #[test]
    fn test_finalizes_once_on_last_release() {
        let h = harness(2, StopPlan::compute(0, 0, 0));
        h.controller.request_start(TrackFormat::video(1)).unwrap();
        h.controller.request_start(TrackFormat::audio(1)).unwrap();
        h.controller.write(0, &sample(0)).unwrap();
        h.controller.stop_by_user();

        h.controller.request_release(0);
        assert!(h.outcome.lock().is_none());
        assert!(!h.sink.container().lock().finished);

        h.controller.request_release(1);
        assert_eq!(*h.outcome.lock(), Some((StopReason::User, None)));
        assert!(h.sink.container().lock().finished);
        assert!(!h.controller.is_open());

        // Extra releases change nothing.
        h.controller.request_release(1);
        assert_eq!(*h.outcome.lock(), Some((StopReason::User, None)));
    }

    #[test]
    fn test_finalize_without_samples_reports_error() {
        let h = harness(1, StopPlan::compute(0, 0, 0));
        h.controller.request_start(TrackFormat::video(1)).unwrap();
        h.controller.request_release(0);

        let outcome = h.outcome.lock().clone().unwrap();
        assert_eq!(outcome.0, StopReason::User);
        assert!(outcome.1.unwrap().contains("no samples"));
    }

    #[test]
    fn test_release_before_open_reports_error() {
        let h = harness(2, StopPlan::compute(0, 0, 0));
        h.controller.request_start(TrackFormat::video(1)).unwrap();
        h.controller.request_release(0);
        h.controller.request_release(1);

        let outcome = h.outcome.lock().clone().unwrap();
        assert!(outcome.1.unwrap().contains("never opened"));
        assert!(!h.sink.container().lock().finished);
    }
}
