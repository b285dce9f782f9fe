//! Recording slots
//!
//! Each slot drives one capture stream and recorder through
//! `Idle -> Recording <-> Paused -> Finalizing -> Idle`, keeping the
//! finished artifact until the next recording replaces it.

use crate::audio::backend::{
    CaptureStream, Container, MediaBackend, MediaRecorder, RecorderEvent, RecorderSink, SlotEvent,
    StreamConstraints,
};
use crate::audio::wav::wav_duration_secs;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Number of independent recording slots
pub const SLOT_COUNT: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("No slot with index {0}")]
    UnknownSlot(usize),

    #[error("Source {} has no device selected", .0 + 1)]
    NoDeviceSelected(usize),

    #[error("Source {} is recording", .0 + 1)]
    Busy(usize),

    #[error("Source {} failed to start: {reason}", .slot + 1)]
    CaptureStart { slot: usize, reason: String },
}

/// A finished recording
#[derive(Debug, Clone)]
pub struct Artifact {
    data: Arc<Vec<u8>>,
    container: Container,
    recorded_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(data: Vec<u8>, container: Container) -> Self {
        Self {
            data: Arc::new(data),
            container,
            recorded_at: Utc::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn mime_type(&self) -> &'static str {
        self.container.mime_type()
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Playing time, for containers we can read without a decoder
    pub fn duration_secs(&self) -> Option<f32> {
        match self.container {
            Container::Wav => wav_duration_secs(&self.data).ok(),
            Container::Webm => None,
        }
    }
}

/// Observable lifecycle phase of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    Recording,
    Paused,
    /// Stop was requested; waiting for the recorder to hand over the artifact
    Finalizing,
}

struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    recorder: Box<dyn MediaRecorder>,
    chunks: Vec<Vec<u8>>,
}

struct PendingArtifact {
    recorder: Box<dyn MediaRecorder>,
    chunks: Vec<Vec<u8>>,
}

enum SlotState {
    Idle,
    Recording(ActiveCapture),
    Paused(ActiveCapture),
    Finalizing(PendingArtifact),
}

impl SlotState {
    fn phase(&self) -> SlotPhase {
        match self {
            SlotState::Idle => SlotPhase::Idle,
            SlotState::Recording(_) => SlotPhase::Recording,
            SlotState::Paused(_) => SlotPhase::Paused,
            SlotState::Finalizing(_) => SlotPhase::Finalizing,
        }
    }
}

/// One recording lifecycle
pub struct RecordingSlot {
    index: usize,
    selected_device_id: Option<String>,
    state: SlotState,
    artifact: Option<Artifact>,
    /// Incremented on every start; recorder events from older cycles are dropped
    cycle: u64,
}

impl RecordingSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            selected_device_id: None,
            state: SlotState::Idle,
            artifact: None,
            cycle: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn selected_device_id(&self) -> Option<&str> {
        self.selected_device_id.as_deref()
    }

    pub fn phase(&self) -> SlotPhase {
        self.state.phase()
    }

    /// True from a successful start until the artifact has been handed over
    pub fn is_recording(&self) -> bool {
        !matches!(self.state, SlotState::Idle)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, SlotState::Paused(_))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    /// Recent input peaks while the stream is open, oldest first
    pub fn levels(&self) -> Vec<f32> {
        match &self.state {
            SlotState::Recording(capture) | SlotState::Paused(capture) => capture.stream.levels(),
            _ => Vec::new(),
        }
    }

    /// Whether the Start control should be offered
    pub fn can_start(&self) -> bool {
        !self.is_recording() && self.selected_device_id.is_some()
    }

    /// File name used when uploading this slot's artifact
    pub fn upload_filename(&self) -> Option<String> {
        self.artifact
            .as_ref()
            .map(|artifact| upload_filename(self.index, artifact.container()))
    }

    /// Choose the device for the next recording; `None` clears the choice
    pub fn select_device(&mut self, device_id: Option<String>) -> Result<(), SlotError> {
        if self.is_recording() {
            return Err(SlotError::Busy(self.index));
        }
        debug!("Source {} device selected: {:?}", self.index + 1, device_id);
        self.selected_device_id = device_id.filter(|id| !id.is_empty());
        Ok(())
    }

    /// Open the selected device and begin recording
    pub fn start(
        &mut self,
        backend: &dyn MediaBackend,
        events: &Sender<SlotEvent>,
    ) -> Result<(), SlotError> {
        if self.is_recording() {
            return Err(SlotError::Busy(self.index));
        }
        let device_id = self
            .selected_device_id
            .clone()
            .ok_or(SlotError::NoDeviceSelected(self.index))?;

        self.cycle += 1;
        let sink = RecorderSink::new(self.index, self.cycle, events.clone());

        match open_capture(backend, &device_id, sink) {
            Ok(capture) => {
                self.state = SlotState::Recording(capture);
                info!("Source {} recording from {}", self.index + 1, device_id);
                Ok(())
            }
            Err(e) => {
                if e.is_recoverable() {
                    warn!("Could not start source {}: {}", self.index + 1, e);
                } else {
                    error!("Error starting audio stream for source {}: {}", self.index + 1, e);
                }
                Err(SlotError::CaptureStart {
                    slot: self.index,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Suspend the recorder; ignored unless recording and not paused
    pub fn pause(&mut self) {
        match std::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Recording(mut capture) => {
                capture.recorder.pause();
                self.state = SlotState::Paused(capture);
                info!("Source {} paused", self.index + 1);
            }
            other => {
                debug!("Source {} ignoring pause in {:?}", self.index + 1, other.phase());
                self.state = other;
            }
        }
    }

    /// Continue a paused recording; ignored unless paused
    pub fn resume(&mut self) {
        match std::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Paused(mut capture) => {
                capture.recorder.resume();
                self.state = SlotState::Recording(capture);
                info!("Source {} resumed", self.index + 1);
            }
            other => {
                debug!("Source {} ignoring resume in {:?}", self.index + 1, other.phase());
                self.state = other;
            }
        }
    }

    /// Ask the recorder to finalize and release the stream right away
    ///
    /// The artifact shows up later, when the recorder reports `Stopped`.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Recording(capture) | SlotState::Paused(capture) => {
                let ActiveCapture {
                    mut stream,
                    mut recorder,
                    chunks,
                } = capture;
                recorder.stop();
                stream.stop();
                self.state = SlotState::Finalizing(PendingArtifact { recorder, chunks });
                info!("Source {} stopping, waiting for recorder", self.index + 1);
            }
            other => {
                debug!("Source {} ignoring stop in {:?}", self.index + 1, other.phase());
                self.state = other;
            }
        }
    }

    /// Apply an event pushed by this slot's recorder
    pub fn handle_recorder_event(&mut self, cycle: u64, event: RecorderEvent) {
        if cycle != self.cycle {
            debug!(
                "Source {} dropping event from stale cycle {} (current {})",
                self.index + 1,
                cycle,
                self.cycle
            );
            return;
        }

        match event {
            RecorderEvent::DataAvailable(chunk) => match &mut self.state {
                SlotState::Recording(capture) | SlotState::Paused(capture) => {
                    capture.chunks.push(chunk)
                }
                SlotState::Finalizing(pending) => pending.chunks.push(chunk),
                SlotState::Idle => {
                    debug!("Source {} dropping chunk while idle", self.index + 1)
                }
            },
            RecorderEvent::Stopped => self.finalize(),
            RecorderEvent::Error(message) => {
                warn!("Source {} recorder error: {}", self.index + 1, message)
            }
        }
    }

    /// Release the stream and recorder without waiting for an artifact
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Recording(mut capture) | SlotState::Paused(mut capture) => {
                capture.recorder.stop();
                capture.stream.stop();
                info!(
                    "Source {} released open stream on {}",
                    self.index + 1,
                    capture.stream.device_id()
                );
            }
            SlotState::Finalizing(_) => {
                debug!("Source {} discarded pending recording", self.index + 1);
            }
            SlotState::Idle => {}
        }
    }

    // Artifact and the Idle transition land together, in this one call.
    fn finalize(&mut self) {
        let (recorder, chunks) = match std::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Finalizing(pending) => (pending.recorder, pending.chunks),
            SlotState::Recording(capture) | SlotState::Paused(capture) => {
                let ActiveCapture {
                    mut stream,
                    recorder,
                    chunks,
                } = capture;
                warn!(
                    "Source {} recorder stopped on its own, {} lost",
                    self.index + 1,
                    stream.device_id()
                );
                stream.stop();
                (recorder, chunks)
            }
            SlotState::Idle => {
                debug!("Source {} ignoring stop notification while idle", self.index + 1);
                return;
            }
        };

        let container = recorder.container();
        drop(recorder);

        let artifact = Artifact::new(chunks.concat(), container);
        info!(
            "Source {} recording ready: {} bytes of {}",
            self.index + 1,
            artifact.len(),
            artifact.mime_type()
        );
        self.artifact = Some(artifact);
    }
}

impl std::fmt::Debug for RecordingSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSlot")
            .field("index", &self.index)
            .field("selected_device_id", &self.selected_device_id)
            .field("phase", &self.phase())
            .field("artifact_len", &self.artifact.as_ref().map(Artifact::len))
            .field("cycle", &self.cycle)
            .finish()
    }
}

/// `audio-{index}.{ext}`, keeping the slot index even when other slots are empty
pub fn upload_filename(index: usize, container: Container) -> String {
    format!("audio-{}.{}", index, container.extension())
}

fn open_capture(
    backend: &dyn MediaBackend,
    device_id: &str,
    sink: RecorderSink,
) -> crate::Result<ActiveCapture> {
    let mut stream = backend.open_stream(&StreamConstraints::exact(device_id))?;

    let mut recorder = match stream.create_recorder(sink) {
        Ok(recorder) => recorder,
        Err(e) => {
            stream.stop();
            return Err(e);
        }
    };

    if let Err(e) = recorder.start() {
        stream.stop();
        return Err(e);
    }

    Ok(ActiveCapture {
        stream,
        recorder,
        chunks: Vec::new(),
    })
}
