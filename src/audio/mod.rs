pub mod backend;
pub mod devices;
#[cfg(feature = "audio-io")]
pub mod input;
pub mod level;
#[cfg(feature = "audio-io")]
pub mod preview;
pub mod wav;

pub use backend::{
    CaptureStream, Container, DeviceKind, DeviceRecord, MediaBackend, MediaRecorder,
    PermissionState, RecorderEvent, RecorderSink, SlotEvent, StreamConstraints,
};
pub use devices::{list_input_devices, request_permission, AudioDevice, DeviceRegistry};
pub use level::{LevelMeter, LEVEL_HISTORY};
#[cfg(feature = "audio-io")]
pub use input::CpalBackend;
#[cfg(feature = "audio-io")]
pub use preview::PreviewPlayer;
pub use wav::{encode_wav, wav_duration_secs};
