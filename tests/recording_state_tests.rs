//! Recording state machine tests
//!
//! Drive the session through start/pause/resume/stop sequences against the
//! in-memory backend and check the slot invariants after every step.

use multirec::config::AppConfig;
use multirec::slot::{SlotError, SlotPhase, SLOT_COUNT};
use multirec::testing::{InMemoryBackend, RecordingTransport};
use multirec::ui::AppState;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn four_mics() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_input("mic-a", "Mic A")
        .with_input("mic-b", "Mic B")
        .with_input("mic-c", "Mic C")
        .with_input("mic-d", "Mic D")
        .with_output("spk", "Speakers")
}

fn session(backend: &InMemoryBackend, rt: &tokio::runtime::Runtime) -> AppState {
    AppState::new(
        &AppConfig::default(),
        Box::new(backend.clone()),
        Arc::new(RecordingTransport::new()),
        rt.handle().clone(),
    )
}

fn assert_paused_implies_recording(state: &AppState) {
    for slot in state.slots() {
        if slot.is_paused() {
            assert!(slot.is_recording(), "slot {} paused but not recording", slot.index());
        }
    }
}

#[test]
fn test_initial_state_is_idle() {
    let rt = runtime();
    let backend = four_mics();
    let state = session(&backend, &rt);

    assert_eq!(state.slots().len(), SLOT_COUNT);
    for slot in state.slots() {
        assert_eq!(slot.phase(), SlotPhase::Idle);
        assert!(!slot.is_recording());
        assert!(!slot.has_artifact());
        assert!(!slot.can_start());
    }
    assert_eq!(state.registry().len(), 4, "outputs are filtered out");
}

#[test]
fn test_start_without_device_is_rejected() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);

    assert_eq!(state.start(0), Err(SlotError::NoDeviceSelected(0)));
    assert!(!state.slot(0).unwrap().is_recording());
    assert_eq!(backend.open_stream_count(), 0);
}

#[test]
fn test_paused_implies_recording_through_transitions() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();

    enum Op {
        Start,
        Pause,
        Resume,
        Stop,
        Poll,
    }

    let ops = [
        Op::Start,
        Op::Pause,
        Op::Resume,
        Op::Pause,
        Op::Stop,
        Op::Poll,
        Op::Pause,
        Op::Resume,
    ];

    for op in ops {
        match op {
            Op::Start => state.start(0).unwrap(),
            Op::Pause => state.pause(0).unwrap(),
            Op::Resume => state.resume(0).unwrap(),
            Op::Stop => state.stop(0).unwrap(),
            Op::Poll => state.poll_events(),
        }
        assert_paused_implies_recording(&state);
    }
    assert_eq!(state.slot(0).unwrap().phase(), SlotPhase::Idle);
}

#[test]
fn test_pause_twice_equals_pause_once() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(1, Some("mic-b".into())).unwrap();
    state.start(1).unwrap();

    state.pause(1).unwrap();
    state.pause(1).unwrap();

    let slot = state.slot(1).unwrap();
    assert_eq!(slot.phase(), SlotPhase::Paused);
    assert!(slot.is_recording());
    let pauses = backend.calls().iter().filter(|c| *c == "pause:mic-b").count();
    assert_eq!(pauses, 1);
}

#[test]
fn test_resume_while_recording_is_noop() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();
    state.start(0).unwrap();

    state.resume(0).unwrap();

    assert_eq!(state.slot(0).unwrap().phase(), SlotPhase::Recording);
    assert!(!backend.calls().contains(&"resume:mic-a".to_string()));
}

#[test]
fn test_stop_never_started_slot() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);

    state.stop(2).unwrap();
    state.poll_events();

    let slot = state.slot(2).unwrap();
    assert_eq!(slot.phase(), SlotPhase::Idle);
    assert!(slot.artifact().is_none());
}

#[test]
fn test_start_stop_yields_one_artifact_with_flag_cleared() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();

    state.start(0).unwrap();
    state.stop(0).unwrap();

    // Stream is released at once, artifact comes with the next poll
    assert_eq!(backend.open_stream_count(), 0);
    let slot = state.slot(0).unwrap();
    assert_eq!(slot.phase(), SlotPhase::Finalizing);
    assert!(slot.is_recording());
    assert!(slot.artifact().is_none());

    state.poll_events();

    let slot = state.slot(0).unwrap();
    assert!(!slot.is_recording());
    let artifact = slot.artifact().expect("artifact after stop");
    assert!(!artifact.is_empty());
    assert_eq!(artifact.mime_type(), "audio/webm");
    assert_eq!(slot.upload_filename().as_deref(), Some("audio-0.webm"));
}

#[test]
fn test_recording_again_replaces_artifact() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();

    state.start(0).unwrap();
    state.stop(0).unwrap();
    state.poll_events();
    let first = state.slot(0).unwrap().artifact().unwrap().recorded_at();

    state.start(0).unwrap();
    assert!(
        state.slot(0).unwrap().has_artifact(),
        "previous take stays until the new one is ready"
    );
    state.stop(0).unwrap();
    state.poll_events();

    let second = state.slot(0).unwrap().artifact().unwrap().recorded_at();
    assert!(second >= first);
}

#[test]
fn test_device_change_rejected_while_recording() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();
    state.start(0).unwrap();

    assert_eq!(
        state.select_device(0, Some("mic-b".into())),
        Err(SlotError::Busy(0))
    );
    assert_eq!(state.slot(0).unwrap().selected_device_id(), Some("mic-a"));
}

#[test]
fn test_slots_are_independent() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    for (index, id) in ["mic-a", "mic-b", "mic-c", "mic-d"].iter().enumerate() {
        state.select_device(index, Some(id.to_string())).unwrap();
        state.start(index).unwrap();
    }
    assert_eq!(backend.open_stream_count(), 4);

    state.pause(1).unwrap();
    state.stop(2).unwrap();
    state.poll_events();

    let phases: Vec<SlotPhase> = state.slots().iter().map(|s| s.phase()).collect();
    assert_eq!(
        phases,
        vec![
            SlotPhase::Recording,
            SlotPhase::Paused,
            SlotPhase::Idle,
            SlotPhase::Recording
        ]
    );
    assert!(state.slot(2).unwrap().has_artifact());
    assert!(!state.slot(0).unwrap().has_artifact());
    assert_paused_implies_recording(&state);
}

#[test]
fn test_same_device_twice_fails_second_start() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();
    state.select_device(1, Some("mic-a".into())).unwrap();

    state.start(0).unwrap();
    let err = state.start(1).unwrap_err();

    assert!(matches!(err, SlotError::CaptureStart { slot: 1, .. }));
    assert_eq!(state.slot(1).unwrap().phase(), SlotPhase::Idle);
    assert_eq!(state.slot(0).unwrap().phase(), SlotPhase::Recording);
}

#[test]
fn test_disconnected_device_finalizes_recording() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(3, Some("mic-d".into())).unwrap();
    state.start(3).unwrap();

    backend.disconnect("mic-d");
    state.poll_events();

    let slot = state.slot(3).unwrap();
    assert!(!slot.is_recording());
    assert!(slot.has_artifact());
    assert_eq!(backend.open_stream_count(), 0);
}

#[test]
fn test_activity_log_records_lifecycle() {
    let rt = runtime();
    let backend = four_mics();
    let mut state = session(&backend, &rt);
    state.select_device(0, Some("mic-a".into())).unwrap();

    state.start(0).unwrap();
    state.stop(0).unwrap();
    state.poll_events();

    let lines: Vec<&str> = state.activity.lines().collect();
    assert!(lines.iter().any(|l| l.contains("Source 1 recording from Mic A")));
    assert!(lines.iter().any(|l| l.contains("Source 1 stopped")));
    assert!(lines.iter().any(|l| l.contains("Source 1 recording ready")));
}
