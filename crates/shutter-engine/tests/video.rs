mod common;

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use common::{drain, harness, wait_for};
use shutter_capture::{SurfaceHandle, Template};
use shutter_engine::EngineError;
use shutter_ipc::{EngineConfig, EngineEvent, Mode, StopReason, TemplateRestorePolicy, VideoRequest};

fn video_config() -> EngineConfig {
    EngineConfig {
        mode: Mode::Video,
        ..Default::default()
    }
}

fn wait_for_file(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !path.exists() {
        assert!(Instant::now() < deadline, "container was never created");
        thread::sleep(Duration::from_millis(5));
    }
    // Let the first sample land behind the header.
    thread::sleep(Duration::from_millis(50));
}

#[test]
fn test_take_video_records_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.shv");
    let h = harness(video_config());
    h.engine.start().wait().unwrap();
    assert_eq!(h.sim.sessions()[0].len(), 1);

    h.engine
        .take_video(VideoRequest {
            output: output.clone(),
            ..Default::default()
        })
        .wait()
        .unwrap();

    let sessions = h.sim.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[1].contains(&SurfaceHandle::new(5_000)));
    assert_eq!(h.sim.open_count(), 1);
    let record = h.sim.repeating().unwrap();
    assert_eq!(record.tag, Template::Record);
    assert_eq!(record.targets.len(), 2);

    assert_eq!(h.sim.emit_frames(3), 3);
    wait_for(&h.events, |e| matches!(e, EngineEvent::VideoRecordingStart));
    wait_for_file(&output);

    h.engine.stop_video().wait().unwrap();
    let events = wait_for(&h.events, |e| matches!(e, EngineEvent::VideoResult { .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::VideoRecordingEnd)));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::EncoderStopped {
            reason: StopReason::User,
            error: None
        }
    )));
    let Some(EngineEvent::VideoResult { result }) = events.last() else {
        panic!("no video result");
    };
    let outcome = result.as_ref().unwrap();
    assert_eq!(outcome.output, output);
    assert_eq!(outcome.reason, StopReason::User);

    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"SHMX"));

    h.engine.sync().unwrap();
    assert_eq!(h.sim.repeating().unwrap().tag, Template::Preview);
    assert!(h.engine.stage_states().all_started());
}

#[test]
fn test_restore_before_recorder_stop() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("early.shv");
    let config = EngineConfig {
        template_restore: TemplateRestorePolicy::BeforeRecorderStop,
        ..video_config()
    };
    let h = harness(config);
    h.engine.start().wait().unwrap();
    h.engine
        .take_video(VideoRequest {
            output: output.clone(),
            ..Default::default()
        })
        .wait()
        .unwrap();
    h.sim.emit_frames(2);
    wait_for(&h.events, |e| matches!(e, EngineEvent::VideoRecordingStart));
    wait_for_file(&output);

    // Resolves before the encoder finalizes; the template is already back.
    h.engine.stop_video().wait().unwrap();
    assert_eq!(h.sim.repeating().unwrap().tag, Template::Preview);

    wait_for(&h.events, |e| matches!(e, EngineEvent::VideoResult { .. }));
}

#[test]
fn test_video_stops_at_max_duration() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("short.shv");
    let h = harness(video_config());
    h.engine.start().wait().unwrap();
    h.engine
        .take_video(VideoRequest {
            output,
            max_duration_ms: 1,
            ..Default::default()
        })
        .wait()
        .unwrap();

    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let result = loop {
        assert!(Instant::now() < deadline, "recording never hit its limit");
        h.sim.emit_frames(1);
        thread::sleep(Duration::from_millis(10));
        seen.extend(h.events.try_iter());
        if let Some(EngineEvent::VideoResult { result }) = seen
            .iter()
            .find(|e| matches!(e, EngineEvent::VideoResult { .. }))
        {
            break result.clone();
        }
    };

    assert_eq!(result.unwrap().reason, StopReason::MaxDuration);
    assert!(seen
        .iter()
        .any(|e| matches!(e, EngineEvent::VideoRecordingEnd)));
    h.engine.sync().unwrap();
    assert_eq!(h.sim.repeating().unwrap().tag, Template::Preview);
}

#[test]
fn test_stop_before_first_frame_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(video_config());
    h.engine.start().wait().unwrap();
    h.engine
        .take_video(VideoRequest {
            output: dir.path().join("empty.shv"),
            ..Default::default()
        })
        .wait()
        .unwrap();
    drain(&h.events);

    h.engine.stop_video().wait().unwrap();
    let events = wait_for(&h.events, |e| matches!(e, EngineEvent::VideoResult { .. }));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::VideoResult { result: Err(_) })
    ));
    h.engine.sync().unwrap();
    assert_eq!(h.sim.repeating().unwrap().tag, Template::Preview);
}

#[test]
fn test_take_video_needs_video_mode() {
    let h = harness(EngineConfig::default());
    h.engine.start().wait().unwrap();

    let error = h
        .engine
        .take_video(VideoRequest::default())
        .wait()
        .unwrap_err();
    assert!(matches!(error, EngineError::InvalidState(_)));
    assert_eq!(h.sim.sessions().len(), 1);
}

#[test]
fn test_take_video_needs_preview() {
    let h = harness(video_config());
    let error = h
        .engine
        .take_video(VideoRequest::default())
        .wait()
        .unwrap_err();
    assert!(matches!(error, EngineError::InvalidState(_)));
}

#[test]
fn test_second_take_video_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(video_config());
    h.engine.start().wait().unwrap();
    let request = VideoRequest {
        output: dir.path().join("once.shv"),
        ..Default::default()
    };
    h.engine.take_video(request.clone()).wait().unwrap();

    let error = h.engine.take_video(request).wait().unwrap_err();
    assert!(matches!(error, EngineError::InvalidState(_)));
    h.engine.stop_video().wait().unwrap();
    wait_for(&h.events, |e| matches!(e, EngineEvent::VideoResult { .. }));
}

#[test]
fn test_stop_while_recording_ends_video() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("teardown.shv");
    let h = harness(video_config());
    h.engine.start().wait().unwrap();
    h.engine
        .take_video(VideoRequest {
            output: output.clone(),
            ..Default::default()
        })
        .wait()
        .unwrap();
    h.sim.emit_frames(2);
    wait_for(&h.events, |e| matches!(e, EngineEvent::VideoRecordingStart));
    wait_for_file(&output);

    h.engine.stop().wait().unwrap();
    let events = wait_for(&h.events, |e| matches!(e, EngineEvent::VideoResult { .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::VideoRecordingEnd)));
    assert!(h.engine.stage_states().all_off());
}
