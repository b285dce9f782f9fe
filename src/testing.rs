//! In-memory media backend and upload transport
//!
//! Used by the test suites and by builds without `audio-io`. The backend
//! behaves like a browser media stack: one open stream per device, a
//! permission prompt that is granted on first capture, and recorders that
//! deliver a single webm chunk when stopped.

use crate::audio::backend::{
    CaptureStream, Container, DeviceKind, DeviceRecord, MediaBackend, MediaRecorder,
    PermissionState, RecorderEvent, RecorderSink, StreamConstraints,
};
use crate::audio::level::LevelMeter;
use crate::slot::Artifact;
use crate::upload::{UploadError, UploadTarget, UploadTransport};
use crate::{MultirecError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// EBML magic that opens every webm file
const WEBM_MAGIC: [u8; 4] = [0x1a, 0x45, 0xdf, 0xa3];

struct BackendState {
    devices: Vec<DeviceRecord>,
    permission: PermissionState,
    fail_enumeration: bool,
    failing_recorders: HashSet<String>,
    open_streams: Vec<String>,
    meters: HashMap<String, LevelMeter>,
    active_recorders: Vec<(String, RecorderSink)>,
    calls: Vec<String>,
}

/// Scriptable media backend
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// A backend with no devices and permission already granted
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                devices: Vec::new(),
                permission: PermissionState::Granted,
                fail_enumeration: false,
                failing_recorders: HashSet::new(),
                open_streams: Vec::new(),
                meters: HashMap::new(),
                active_recorders: Vec::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_input(self, device_id: &str, label: &str) -> Self {
        self.state.lock().devices.push(DeviceRecord::input(device_id, label));
        self
    }

    pub fn with_output(self, device_id: &str, label: &str) -> Self {
        self.state.lock().devices.push(DeviceRecord::output(device_id, label));
        self
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.state.lock().permission = permission;
        self
    }

    pub fn failing_enumeration(self) -> Self {
        self.state.lock().fail_enumeration = true;
        self
    }

    /// Recorders created for `device_id` fail to start
    pub fn failing_recorder(self, device_id: &str) -> Self {
        self.state.lock().failing_recorders.insert(device_id.to_string());
        self
    }

    /// Unplug a device: its running recorders flush and stop on their own
    pub fn disconnect(&self, device_id: &str) {
        let mut state = self.state.lock();
        state.devices.retain(|d| d.device_id != device_id);

        let (unplugged, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut state.active_recorders)
            .into_iter()
            .partition(|(id, _)| id == device_id);
        state.active_recorders = remaining;
        state.calls.push(format!("disconnect:{}", device_id));
        drop(state);

        for (id, sink) in unplugged {
            sink.emit(RecorderEvent::DataAvailable(webm_payload(&id)));
            sink.emit(RecorderEvent::Stopped);
        }
    }

    /// Push one block of input into the open stream on `device_id`
    pub fn feed_levels(&self, device_id: &str, samples: &[f32]) {
        if let Some(meter) = self.state.lock().meters.get(device_id) {
            meter.push_block(samples);
        }
    }

    /// Streams currently holding a device
    pub fn open_stream_count(&self) -> usize {
        self.state.lock().open_streams.len()
    }

    /// Every backend interaction in order, e.g. `open:mic-a`, `pause:mic-a`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

impl MediaBackend for InMemoryBackend {
    fn permission_state(&self) -> PermissionState {
        self.state.lock().permission
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceRecord>> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(MultirecError::AudioDeviceError("Enumeration failed".into()));
        }
        Ok(state.devices.clone())
    }

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>> {
        let mut state = self.state.lock();

        match state.permission {
            PermissionState::Denied => {
                return Err(MultirecError::PermissionDenied("Microphone access denied".into()))
            }
            // The prompt is answered with "allow"
            PermissionState::Prompt => state.permission = PermissionState::Granted,
            PermissionState::Granted => {}
        }

        let mut inputs = state
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::AudioInput);
        let device_id = match &constraints.device_id {
            Some(id) => inputs
                .find(|d| &d.device_id == id)
                .map(|d| d.device_id.clone())
                .ok_or_else(|| {
                    MultirecError::AudioDeviceError(format!("Requested device not found: {}", id))
                })?,
            None => inputs
                .next()
                .map(|d| d.device_id.clone())
                .ok_or_else(|| MultirecError::AudioDeviceError("No input device available".into()))?,
        };

        if state.open_streams.contains(&device_id) {
            return Err(MultirecError::AudioDeviceError(format!(
                "Device in use: {}",
                device_id
            )));
        }

        let levels = LevelMeter::new();
        state.open_streams.push(device_id.clone());
        state.meters.insert(device_id.clone(), levels.clone());
        state.calls.push(format!("open:{}", device_id));
        drop(state);

        Ok(Box::new(InMemoryStream {
            device_id,
            backend: self.clone(),
            levels,
            active: true,
        }))
    }
}

struct InMemoryStream {
    device_id: String,
    backend: InMemoryBackend,
    levels: LevelMeter,
    active: bool,
}

impl CaptureStream for InMemoryStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn levels(&self) -> Vec<f32> {
        if self.active {
            self.levels.snapshot()
        } else {
            Vec::new()
        }
    }

    fn create_recorder(&mut self, sink: RecorderSink) -> Result<Box<dyn MediaRecorder>> {
        if self
            .backend
            .state
            .lock()
            .failing_recorders
            .contains(&self.device_id)
        {
            return Err(MultirecError::RecorderError(format!(
                "Recorder unavailable for {}",
                self.device_id
            )));
        }
        Ok(Box::new(InMemoryRecorder {
            device_id: self.device_id.clone(),
            backend: self.backend.clone(),
            sink,
            running: false,
        }))
    }

    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let mut state = self.backend.state.lock();
        if let Some(pos) = state.open_streams.iter().position(|id| id == &self.device_id) {
            state.open_streams.remove(pos);
        }
        state.meters.remove(&self.device_id);
        state.calls.push(format!("release:{}", self.device_id));
    }
}

impl Drop for InMemoryStream {
    fn drop(&mut self) {
        self.stop();
    }
}

struct InMemoryRecorder {
    device_id: String,
    backend: InMemoryBackend,
    sink: RecorderSink,
    running: bool,
}

impl MediaRecorder for InMemoryRecorder {
    fn container(&self) -> Container {
        Container::Webm
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        let mut state = self.backend.state.lock();
        state
            .active_recorders
            .push((self.device_id.clone(), self.sink.clone()));
        state.calls.push(format!("start:{}", self.device_id));
        Ok(())
    }

    fn pause(&mut self) {
        self.backend.record(format!("pause:{}", self.device_id));
    }

    fn resume(&mut self) {
        self.backend.record(format!("resume:{}", self.device_id));
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        {
            let mut state = self.backend.state.lock();
            let slot = self.sink.slot();
            state
                .active_recorders
                .retain(|(id, sink)| !(id == &self.device_id && sink.slot() == slot));
            state.calls.push(format!("stop:{}", self.device_id));
        }

        self.sink
            .emit(RecorderEvent::DataAvailable(webm_payload(&self.device_id)));
        self.sink.emit(RecorderEvent::Stopped);
    }
}

fn webm_payload(device_id: &str) -> Vec<u8> {
    let mut payload = WEBM_MAGIC.to_vec();
    payload.extend_from_slice(device_id.as_bytes());
    payload
}

/// What a `RecordingTransport` was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedUpload {
    pub url: String,
    pub authorization: String,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Default)]
struct TransportState {
    posts: Vec<PostedUpload>,
    status_failures: HashMap<usize, u16>,
    unreachable: HashSet<usize>,
    delay: Option<Duration>,
}

/// Upload transport that records requests instead of sending them
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the `attempt`-th request (1-based) with HTTP `code`
    pub fn failing_attempt(self, attempt: usize, code: u16) -> Self {
        self.state.lock().status_failures.insert(attempt, code);
        self
    }

    /// Fail the `attempt`-th request (1-based) before it reaches a server
    pub fn unreachable_attempt(self, attempt: usize) -> Self {
        self.state.lock().unreachable.insert(attempt);
        self
    }

    /// Hold every request for `delay` before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    pub fn posts(&self) -> Vec<PostedUpload> {
        self.state.lock().posts.clone()
    }
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn post_artifact(
        &self,
        target: &UploadTarget,
        filename: &str,
        artifact: &Artifact,
    ) -> std::result::Result<(), UploadError> {
        let (attempt, delay) = {
            let mut state = self.state.lock();
            state.posts.push(PostedUpload {
                url: target.url.clone(),
                authorization: format!("Bearer {}", target.bearer_token),
                filename: filename.to_string(),
                mime_type: artifact.mime_type().to_string(),
                size: artifact.len(),
            });
            (state.posts.len(), state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.unreachable.contains(&attempt) {
            return Err(UploadError::Transport("connection refused".into()));
        }
        if let Some(&code) = state.status_failures.get(&attempt) {
            return Err(UploadError::Status {
                code,
                reason: "Internal Server Error".into(),
            });
        }
        Ok(())
    }
}
