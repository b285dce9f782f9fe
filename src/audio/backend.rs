//! Media backend abstraction
//!
//! The seam between the recording logic and whatever actually talks to the
//! audio hardware: device enumeration, capture streams and recorders.

use crate::Result;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
}

/// Raw record returned by device enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub kind: DeviceKind,
    /// May be empty until permission has been granted
    pub label: String,
}

impl DeviceRecord {
    pub fn input(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::AudioInput,
            label: label.into(),
        }
    }

    pub fn output(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::AudioOutput,
            label: label.into(),
        }
    }
}

/// Microphone permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
}

/// Constraints used when opening a capture stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Exact device to open, or any input device when `None`
    pub device_id: Option<String>,
}

impl StreamConstraints {
    /// Open exactly this device and fail if it is gone
    pub fn exact(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
        }
    }

    /// Open whichever input the platform picks
    pub fn any() -> Self {
        Self::default()
    }
}

/// Container format of a finished recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Webm,
    Wav,
}

impl Container {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Container::Webm => "audio/webm",
            Container::Wav => "audio/wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Wav => "wav",
        }
    }
}

/// Notifications a recorder pushes while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A chunk of encoded container data
    DataAvailable(Vec<u8>),
    /// The recorder has flushed everything and will emit nothing more
    Stopped,
    /// Non-fatal recorder failure
    Error(String),
}

/// A recorder event tagged with the slot and recording cycle it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEvent {
    pub slot: usize,
    pub cycle: u64,
    pub event: RecorderEvent,
}

/// Where a recorder delivers its events
#[derive(Debug, Clone)]
pub struct RecorderSink {
    slot: usize,
    cycle: u64,
    tx: Sender<SlotEvent>,
}

impl RecorderSink {
    pub fn new(slot: usize, cycle: u64, tx: Sender<SlotEvent>) -> Self {
        Self { slot, cycle, tx }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Deliver an event; returns false once the session has gone away
    pub fn emit(&self, event: RecorderEvent) -> bool {
        let event = SlotEvent {
            slot: self.slot,
            cycle: self.cycle,
            event,
        };
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping recorder event for slot {}: {}", self.slot, e);
                false
            }
        }
    }
}

/// An open capture stream on one input device
pub trait CaptureStream {
    /// Identifier of the device this stream is bound to
    fn device_id(&self) -> &str;

    /// Recent input peaks, oldest first; empty once released
    fn levels(&self) -> Vec<f32>;

    /// Create a recorder fed by this stream
    fn create_recorder(&mut self, sink: RecorderSink) -> Result<Box<dyn MediaRecorder>>;

    /// Release the hardware. Calling it again does nothing.
    fn stop(&mut self);
}

/// Encodes what a capture stream produces into a container
///
/// `stop` does not return the recording. The recorder pushes its remaining
/// data and then `RecorderEvent::Stopped` through its sink, possibly from
/// another thread.
pub trait MediaRecorder {
    fn container(&self) -> Container;

    fn start(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn stop(&mut self);
}

/// Platform media capabilities
pub trait MediaBackend {
    fn permission_state(&self) -> PermissionState;

    fn enumerate_devices(&self) -> Result<Vec<DeviceRecord>>;

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_container_naming() {
        assert_eq!(Container::Webm.mime_type(), "audio/webm");
        assert_eq!(Container::Webm.extension(), "webm");
        assert_eq!(Container::Wav.mime_type(), "audio/wav");
        assert_eq!(Container::Wav.extension(), "wav");
    }

    #[test]
    fn test_sink_tags_events() {
        let (tx, rx) = unbounded();
        let sink = RecorderSink::new(2, 7, tx);

        assert!(sink.emit(RecorderEvent::Stopped));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.slot, 2);
        assert_eq!(event.cycle, 7);
        assert_eq!(event.event, RecorderEvent::Stopped);
    }

    #[test]
    fn test_sink_after_receiver_dropped() {
        let (tx, rx) = unbounded();
        let sink = RecorderSink::new(0, 1, tx);
        drop(rx);

        assert!(!sink.emit(RecorderEvent::DataAvailable(vec![1, 2, 3])));
    }

    #[test]
    fn test_device_kind_serializes_lowercase() {
        let kind = toml::Value::try_from(DeviceKind::AudioInput).unwrap();
        assert_eq!(kind.as_str(), Some("audioinput"));
    }
}
