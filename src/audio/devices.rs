//! Audio input device registry
//!
//! Queries the media backend once for input devices and keeps the result for
//! the device selectors.

use super::backend::{DeviceKind, DeviceRecord, MediaBackend, PermissionState, StreamConstraints};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// An audio input device the user can pick for a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub label: String,
}

impl AudioDevice {
    /// Label shown in selectors; platforms hide labels until permission is granted
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("Microphone {}", self.id)
        } else {
            self.label.clone()
        }
    }
}

impl From<DeviceRecord> for AudioDevice {
    fn from(record: DeviceRecord) -> Self {
        Self {
            id: record.device_id,
            label: record.label,
        }
    }
}

/// List the audio input devices the backend currently reports
///
/// Never fails: a missing permission or a failed enumeration is logged and
/// yields an empty list.
pub fn list_input_devices(backend: &dyn MediaBackend) -> Vec<AudioDevice> {
    match backend.permission_state() {
        PermissionState::Granted => {}
        state => {
            error!("Microphone permission is required (permission state: {:?})", state);
            return Vec::new();
        }
    }

    match backend.enumerate_devices() {
        Ok(records) => {
            let devices: Vec<AudioDevice> = records
                .into_iter()
                .filter(|record| record.kind == DeviceKind::AudioInput)
                .map(AudioDevice::from)
                .collect();
            info!("Found {} audio input device(s)", devices.len());
            devices
        }
        Err(e) => {
            error!("Error accessing media devices: {}", e);
            Vec::new()
        }
    }
}

/// Trigger the platform permission prompt by briefly opening a capture stream
pub fn request_permission(backend: &dyn MediaBackend) {
    match backend.open_stream(&StreamConstraints::any()) {
        Ok(mut stream) => {
            stream.stop();
            info!("Microphone permission granted");
        }
        Err(e) => {
            error!("Microphone permission denied: {}", e);
        }
    }
}

/// Read-only list of input devices, filled once per session
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<AudioDevice>,
}

impl DeviceRegistry {
    /// Query the backend and keep the result
    pub fn load(backend: &dyn MediaBackend) -> Self {
        Self {
            devices: list_input_devices(backend),
        }
    }

    /// Query the backend again, replacing the current list
    pub fn refresh(&mut self, backend: &dyn MediaBackend) {
        self.devices = list_input_devices(backend);
        debug!("Device list refreshed: {} device(s)", self.devices.len());
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&AudioDevice> {
        self.devices.iter().find(|device| device.id == id)
    }

    /// Display label for `id`, or the id itself when it is not listed
    pub fn label_for(&self, id: &str) -> String {
        self.get(id)
            .map(AudioDevice::display_label)
            .unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryBackend;

    #[test]
    fn test_filters_to_inputs() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .with_output("spk-1", "Speakers")
            .with_input("mic-b", "");

        let devices = list_input_devices(&backend);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "mic-a");
        assert_eq!(devices[1].id, "mic-b");
    }

    #[test]
    fn test_display_label_fallback() {
        let named = AudioDevice {
            id: "mic-a".into(),
            label: "Desk Mic".into(),
        };
        let unnamed = AudioDevice {
            id: "mic-b".into(),
            label: String::new(),
        };

        assert_eq!(named.display_label(), "Desk Mic");
        assert_eq!(unnamed.display_label(), "Microphone mic-b");
    }

    #[test]
    fn test_denied_permission_leaves_list_empty() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .with_permission(PermissionState::Denied);

        assert!(DeviceRegistry::load(&backend).is_empty());
    }

    #[test]
    fn test_prompt_permission_leaves_list_empty() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .with_permission(PermissionState::Prompt);

        assert!(list_input_devices(&backend).is_empty());
    }

    #[test]
    fn test_enumeration_failure_leaves_list_empty() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .failing_enumeration();

        assert!(list_input_devices(&backend).is_empty());
    }

    #[test]
    fn test_request_permission_releases_its_stream() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .with_permission(PermissionState::Prompt);

        request_permission(&backend);

        assert_eq!(backend.permission_state(), PermissionState::Granted);
        assert_eq!(backend.open_stream_count(), 0);
        assert_eq!(backend.calls(), vec!["open:mic-a", "release:mic-a"]);
    }

    #[test]
    fn test_refresh_after_permission() {
        let backend = InMemoryBackend::new()
            .with_input("mic-a", "Desk Mic")
            .with_permission(PermissionState::Prompt);

        let mut registry = DeviceRegistry::load(&backend);
        assert!(registry.is_empty());

        request_permission(&backend);
        registry.refresh(&backend);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("mic-a").map(|d| d.label.as_str()), Some("Desk Mic"));
        assert!(registry.get("mic-z").is_none());
        assert_eq!(registry.label_for("mic-a"), "Desk Mic");
        assert_eq!(registry.label_for("mic-z"), "mic-z");
    }
}
