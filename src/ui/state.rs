//! Application state management
//!
//! `AppState` is the session: it owns the device registry, the four slots,
//! the upload form and the channels that bring recorder and upload
//! completions back to the UI thread.

use crate::audio::backend::{MediaBackend, PermissionState, SlotEvent};
use crate::audio::devices::{self, DeviceRegistry};
#[cfg(feature = "audio-io")]
use crate::audio::preview::PreviewPlayer;
use crate::config::AppConfig;
use crate::slot::{RecordingSlot, SlotError, SLOT_COUNT};
use crate::upload::{validate_url, UploadDispatcher, UploadItem, UploadStatus, UploadTarget, UploadTransport};
use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Most recent lines shown in the activity panel
pub const ACTIVITY_LOG_CAPACITY: usize = 100;

/// Bounded list of user-visible events
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    lines: VecDeque<String>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY),
        }
    }

    pub fn add(&mut self, message: impl Into<String>) {
        if self.lines.len() >= ACTIVITY_LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines
            .push_back(format!("[{}] {}", Local::now().format("%H:%M:%S"), message.into()));
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Central application state
pub struct AppState {
    backend: Box<dyn MediaBackend>,
    registry: DeviceRegistry,
    slots: [RecordingSlot; SLOT_COUNT],

    /// Contents of the URL field
    pub upload_url: String,
    auth_token: String,
    /// Latest upload status; each new one replaces the previous
    upload_status: Option<String>,
    uploading: bool,
    dispatcher: UploadDispatcher,
    runtime: Handle,

    recorder_tx: Sender<SlotEvent>,
    recorder_rx: Receiver<SlotEvent>,
    status_tx: Sender<UploadStatus>,
    status_rx: Receiver<UploadStatus>,

    /// Activity log
    pub activity: ActivityLog,

    /// Whether to show the activity panel
    pub show_activity_panel: bool,

    #[cfg(feature = "audio-io")]
    preview: PreviewPlayer,

    shut_down: bool,
}

impl AppState {
    /// Create the session and list the available input devices
    ///
    /// Uploads are spawned on `runtime`.
    pub fn new(
        config: &AppConfig,
        backend: Box<dyn MediaBackend>,
        transport: Arc<dyn UploadTransport>,
        runtime: Handle,
    ) -> Self {
        if config.request_permission_on_start
            && backend.permission_state() == PermissionState::Prompt
        {
            devices::request_permission(backend.as_ref());
        }
        let registry = DeviceRegistry::load(backend.as_ref());

        let (recorder_tx, recorder_rx) = unbounded();
        let (status_tx, status_rx) = unbounded();

        let mut activity = ActivityLog::new();
        activity.add(format!("Found {} input device(s)", registry.len()));

        Self {
            backend,
            registry,
            slots: std::array::from_fn(RecordingSlot::new),
            upload_url: config.upload_url.clone(),
            auth_token: config.auth_token.clone(),
            upload_status: None,
            uploading: false,
            dispatcher: UploadDispatcher::new(transport),
            runtime,
            recorder_tx,
            recorder_rx,
            status_tx,
            status_rx,
            activity,
            show_activity_panel: false,
            #[cfg(feature = "audio-io")]
            preview: PreviewPlayer::new(),
            shut_down: false,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn slots(&self) -> &[RecordingSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&RecordingSlot> {
        self.slots.get(index)
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut RecordingSlot, SlotError> {
        self.slots.get_mut(index).ok_or(SlotError::UnknownSlot(index))
    }

    pub fn any_recording(&self) -> bool {
        self.slots.iter().any(RecordingSlot::is_recording)
    }

    pub fn select_device(&mut self, index: usize, device_id: Option<String>) -> Result<(), SlotError> {
        let result = self.slot_mut(index)?.select_device(device_id);
        if let Err(e) = &result {
            self.activity.add(e.to_string());
        }
        result
    }

    /// Start recording on a slot; a failure leaves the slot idle
    pub fn start(&mut self, index: usize) -> Result<(), SlotError> {
        let slot = self.slots.get_mut(index).ok_or(SlotError::UnknownSlot(index))?;
        let result = slot.start(self.backend.as_ref(), &self.recorder_tx);

        match &result {
            Ok(()) => {
                let device = slot.selected_device_id().unwrap_or_default().to_string();
                let label = self.registry.label_for(&device);
                self.activity
                    .add(format!("Source {} recording from {}", index + 1, label));
            }
            Err(e) => self.activity.add(e.to_string()),
        }
        result
    }

    pub fn pause(&mut self, index: usize) -> Result<(), SlotError> {
        self.slot_mut(index)?.pause();
        Ok(())
    }

    pub fn resume(&mut self, index: usize) -> Result<(), SlotError> {
        self.slot_mut(index)?.resume();
        Ok(())
    }

    /// Stop a slot; the artifact arrives on a later `poll_events`
    pub fn stop(&mut self, index: usize) -> Result<(), SlotError> {
        let slot = self.slot_mut(index)?;
        let was_recording = slot.is_recording();
        slot.stop();
        if was_recording {
            self.activity.add(format!("Source {} stopped", index + 1));
        }
        Ok(())
    }

    /// Ask for microphone access, then list devices again
    pub fn request_permission(&mut self) {
        devices::request_permission(self.backend.as_ref());
        self.refresh_devices();
    }

    pub fn refresh_devices(&mut self) {
        self.registry.refresh(self.backend.as_ref());
        self.activity
            .add(format!("Found {} input device(s)", self.registry.len()));
    }

    /// Process incoming events from recorder and upload channels
    pub fn poll_events(&mut self) {
        while let Ok(SlotEvent { slot, cycle, event }) = self.recorder_rx.try_recv() {
            let Some(target) = self.slots.get_mut(slot) else {
                warn!("Recorder event for unknown slot {}", slot);
                continue;
            };

            let was_recording = target.is_recording();
            target.handle_recorder_event(cycle, event);

            if was_recording && !target.is_recording() {
                let ready = target
                    .artifact()
                    .map(|artifact| format!("Source {} recording ready ({} bytes)", slot + 1, artifact.len()));
                if let Some(message) = ready {
                    self.activity.add(message);
                }
            }
        }

        while let Ok(status) = self.status_rx.try_recv() {
            let message = status.message();
            self.activity.add(message.clone());
            // The batch summary goes to the activity log only; the status
            // line keeps the outcome of the last request
            if !matches!(status, UploadStatus::Finished { .. }) {
                self.upload_status = Some(message);
            }
            if status.is_terminal() {
                self.uploading = false;
            }
        }
    }

    /// Artifacts in slot order, skipping empty slots
    fn upload_items(&self) -> Vec<UploadItem> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.artifact().map(|artifact| UploadItem {
                    index: slot.index(),
                    artifact: artifact.clone(),
                })
            })
            .collect()
    }

    /// Start uploading every finished recording
    ///
    /// Returns false when nothing was started: a batch is already running or
    /// the URL is empty (the status line says so).
    pub fn upload(&mut self) -> bool {
        if self.uploading {
            warn!("Upload already in progress, ignoring request");
            return false;
        }

        if let Err(status) = validate_url(&self.upload_url) {
            let message = status.message();
            self.activity.add(message.clone());
            self.upload_status = Some(message);
            return false;
        }

        let items = self.upload_items();
        let target = UploadTarget {
            url: self.upload_url.trim().to_string(),
            bearer_token: self.auth_token.clone(),
        };
        info!("Uploading {} recording(s) to {}", items.len(), target.url);
        self.activity
            .add(format!("Uploading {} recording(s)", items.len()));

        self.uploading = true;
        self.upload_status = None;
        let statuses = self.dispatcher.upload(target, items);
        let tx = self.status_tx.clone();
        self.runtime.spawn(async move {
            futures::pin_mut!(statuses);
            while let Some(status) = statuses.next().await {
                if tx.send(status).is_err() {
                    debug!("Session closed, dropping upload status");
                    break;
                }
            }
        });
        true
    }

    /// Whether the Upload control should be enabled
    pub fn can_upload(&self) -> bool {
        !self.uploading && self.slots.iter().any(RecordingSlot::has_artifact)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn upload_status(&self) -> Option<&str> {
        self.upload_status.as_deref()
    }

    #[cfg(feature = "audio-io")]
    pub fn play_preview(&mut self, index: usize) {
        let Some(artifact) = self.slots.get(index).and_then(RecordingSlot::artifact) else {
            return;
        };
        if let Err(e) = self.preview.play(index, artifact) {
            warn!("Preview failed: {}", e);
            self.activity.add(e.user_message());
        }
    }

    #[cfg(feature = "audio-io")]
    pub fn stop_preview(&mut self) {
        self.preview.stop();
    }

    #[cfg(feature = "audio-io")]
    pub fn preview_slot(&mut self) -> Option<usize> {
        self.preview.playing_slot()
    }

    /// Release every open stream; safe to call more than once
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        #[cfg(feature = "audio-io")]
        self.preview.stop();

        for slot in self.slots.iter_mut() {
            slot.release();
        }
        info!("Session closed");
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.shutdown();
    }
}
