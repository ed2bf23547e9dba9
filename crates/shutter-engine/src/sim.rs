//! A scripted device backend.
//!
//! [`SimulatedDevice`] answers every call inline on the calling thread and
//! records what it was asked to do. Its [`SimController`] stays with the
//! caller to script failures and to push results and frames into the
//! stream.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use shutter_capture::{
    CaptureRequest, CaptureResult, CaptureTimestamp, DeviceBackend, DeviceCharacteristics,
    DeviceError, DeviceErrorCode, DeviceResult, DeviceStateCallback, Frame, FrameListener,
    PreviewSurface, SessionCallback, SessionConfig, StillCallback, StreamListener, SurfaceHandle,
};
use shutter_ipc::Size;
use tracing::debug;

#[derive(Default)]
struct SimState {
    characteristics: DeviceCharacteristics,

    open: bool,
    opens: usize,
    closes: usize,
    sessions: Vec<Vec<SurfaceHandle>>,
    session_open: bool,

    device_callback: Option<Arc<dyn DeviceStateCallback>>,
    repeating: Option<(CaptureRequest, Arc<dyn StreamListener>)>,
    frame_listener: Option<Arc<dyn FrameListener>>,

    submitted: Vec<CaptureRequest>,
    captures: Vec<CaptureRequest>,
    stills: Vec<CaptureRequest>,

    fail_open: Option<DeviceErrorCode>,
    fail_session: Option<String>,
    fail_repeating: Option<String>,
    fail_still: Option<DeviceError>,

    frame_number: u64,
    start_time: Option<Instant>,
}

/// The backend half, handed to the engine.
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
}

/// The caller half, for scripting and inspection.
#[derive(Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new(characteristics: DeviceCharacteristics) -> (Self, SimController) {
        let state = Arc::new(Mutex::new(SimState {
            characteristics,
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimController { state },
        )
    }
}

impl DeviceBackend for SimulatedDevice {
    fn open(&mut self, device_id: &str, callback: Arc<dyn DeviceStateCallback>) {
        let (failure, characteristics) = {
            let mut state = self.state.lock();
            state.opens += 1;
            match state.fail_open.take() {
                Some(code) => (Some(code), None),
                None => {
                    state.open = true;
                    state.device_callback = Some(Arc::clone(&callback));
                    (None, Some(state.characteristics.clone()))
                }
            }
        };
        debug!(device_id, failed = failure.is_some(), "Simulated open");
        match (failure, characteristics) {
            (Some(code), _) => callback.on_error(code),
            (None, Some(characteristics)) => callback.on_opened(characteristics),
            (None, None) => {}
        }
    }

    fn create_session(&mut self, config: SessionConfig, callback: SessionCallback) {
        let result = {
            let mut state = self.state.lock();
            if !state.open {
                Err(DeviceError::NotOpen)
            } else if let Some(message) = state.fail_session.take() {
                Err(DeviceError::SessionConfiguration(message))
            } else {
                state.sessions.push(config.surfaces.clone());
                state.session_open = true;
                state.frame_listener = config.frame_listener.map(|(_, listener)| listener);
                Ok(())
            }
        };
        callback(result);
    }

    fn submit_repeating(
        &mut self,
        request: CaptureRequest,
        listener: Arc<dyn StreamListener>,
    ) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if !state.session_open {
            return Err(DeviceError::NotOpen);
        }
        if let Some(message) = state.fail_repeating.take() {
            return Err(DeviceError::CaptureFailed(message));
        }
        state.submitted.push(request.clone());
        state.repeating = Some((request, listener));
        Ok(())
    }

    fn stop_repeating(&mut self) -> DeviceResult<()> {
        self.state.lock().repeating = None;
        Ok(())
    }

    fn capture(
        &mut self,
        request: CaptureRequest,
        _listener: Arc<dyn StreamListener>,
    ) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if !state.session_open {
            return Err(DeviceError::NotOpen);
        }
        state.captures.push(request);
        Ok(())
    }

    fn capture_still(&mut self, request: CaptureRequest, callback: StillCallback) {
        let result = {
            let mut state = self.state.lock();
            state.stills.push(request);
            match state.fail_still.take() {
                Some(error) => Err(error),
                None => Ok(Bytes::from_static(b"\xff\xd8simulated\xff\xd9")),
            }
        };
        callback(result);
    }

    fn close_session(&mut self) {
        let mut state = self.state.lock();
        state.session_open = false;
        state.repeating = None;
        state.frame_listener = None;
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.session_open = false;
        state.repeating = None;
        state.frame_listener = None;
        state.device_callback = None;
        state.closes += 1;
    }
}

impl SimController {
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Surfaces of every session created so far.
    pub fn sessions(&self) -> Vec<Vec<SurfaceHandle>> {
        self.state.lock().sessions.clone()
    }

    /// Every repeating request submitted so far.
    pub fn submitted(&self) -> Vec<CaptureRequest> {
        self.state.lock().submitted.clone()
    }

    /// The repeating request currently running.
    pub fn repeating(&self) -> Option<CaptureRequest> {
        self.state.lock().repeating.as_ref().map(|(r, _)| r.clone())
    }

    /// One-shot requests.
    pub fn captures(&self) -> Vec<CaptureRequest> {
        self.state.lock().captures.clone()
    }

    pub fn stills(&self) -> Vec<CaptureRequest> {
        self.state.lock().stills.clone()
    }

    pub fn fail_next_open(&self, code: DeviceErrorCode) {
        self.state.lock().fail_open = Some(code);
    }

    pub fn fail_next_session(&self, message: &str) {
        self.state.lock().fail_session = Some(message.to_string());
    }

    pub fn fail_next_repeating(&self, message: &str) {
        self.state.lock().fail_repeating = Some(message.to_string());
    }

    pub fn fail_next_still(&self, error: DeviceError) {
        self.state.lock().fail_still = Some(error);
    }

    /// Run one frame of the repeating request, reporting `result` with the
    /// next frame number. Returns false if nothing is repeating.
    pub fn emit_result(&self, result: CaptureResult) -> bool {
        let (request, listener, result) = {
            let mut state = self.state.lock();
            let Some((request, listener)) = state.repeating.clone() else {
                return false;
            };
            state.frame_number += 1;
            let result = CaptureResult {
                frame_number: state.frame_number,
                ..result
            };
            (request, listener, result)
        };
        listener.on_capture_started(&request, result.frame_number);
        listener.on_capture_completed(&request, &result);
        true
    }

    /// Run `count` frames with empty metadata.
    pub fn emit_frames(&self, count: usize) -> usize {
        (0..count)
            .take_while(|_| self.emit_result(CaptureResult::default()))
            .count()
    }

    /// Deliver a frame to the frame-processing output. Returns false if no
    /// session has one.
    pub fn emit_processing_frame(&self, size: Size) -> bool {
        let (listener, sequence, start_time) = {
            let mut state = self.state.lock();
            let Some(listener) = state.frame_listener.clone() else {
                return false;
            };
            state.frame_number += 1;
            let start_time = *state.start_time.get_or_insert_with(Instant::now);
            (listener, state.frame_number, start_time)
        };
        listener.on_frame(Frame {
            data: Bytes::from(vec![0u8; Frame::nv21_buffer_size(size)]),
            size,
            rotation: 0,
            timestamp: CaptureTimestamp::now(start_time),
            sequence,
        });
        true
    }

    /// The device went away.
    pub fn disconnect(&self) {
        let callback = self.state.lock().device_callback.take();
        if let Some(callback) = callback {
            callback.on_disconnected();
        }
    }

    /// The device reported a fatal error.
    pub fn raise_error(&self, code: DeviceErrorCode) {
        let callback = self.state.lock().device_callback.clone();
        if let Some(callback) = callback {
            callback.on_error(code);
        }
    }
}

/// A fixed-size preview output.
pub struct StaticPreview {
    handle: SurfaceHandle,
    size: Size,
    stream_size: Mutex<Option<Size>>,
}

impl StaticPreview {
    pub fn new(size: Size) -> Self {
        Self {
            handle: SurfaceHandle::new(1),
            size,
            stream_size: Mutex::new(None),
        }
    }

    /// The stream size the engine picked, once bound.
    pub fn stream_size(&self) -> Option<Size> {
        *self.stream_size.lock()
    }
}

impl PreviewSurface for StaticPreview {
    fn output_size(&self) -> Size {
        self.size
    }

    fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    fn set_stream_size(&self, size: Size) {
        *self.stream_size.lock() = Some(size);
    }
}
