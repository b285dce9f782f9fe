pub mod audio;
pub mod config;
pub mod slot;
pub mod testing;
pub mod ui;
pub mod upload;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MultirecError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Recorder error: {0}")]
    RecorderError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for MultirecError {
    fn from(e: std::io::Error) -> Self {
        MultirecError::IOError(e.to_string())
    }
}

impl From<upload::UploadError> for MultirecError {
    fn from(e: upload::UploadError) -> Self {
        MultirecError::UploadError(e.to_string())
    }
}

impl MultirecError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Device is gone or busy until the user does something about it
            MultirecError::AudioDeviceError(_) => false,
            MultirecError::PermissionDenied(_) => false,
            MultirecError::CaptureError(_) => true,
            MultirecError::RecorderError(_) => true,
            MultirecError::EncodingError(_) => true,
            MultirecError::PlaybackError(_) => true,
            // The user retries by clicking Upload again
            MultirecError::UploadError(_) => true,
            MultirecError::IOError(_) => false,
            MultirecError::ConfigError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            MultirecError::AudioDeviceError(_) => {
                "Audio device error. Please check that the microphone is connected and not in use."
                    .to_string()
            }
            MultirecError::PermissionDenied(_) => {
                "Microphone permission is required.".to_string()
            }
            MultirecError::CaptureError(_) => {
                "Could not start capturing from the selected device.".to_string()
            }
            MultirecError::RecorderError(_) => "Recording failed. Please try again.".to_string(),
            MultirecError::EncodingError(_) => {
                "Could not encode the recording. Please try again.".to_string()
            }
            MultirecError::PlaybackError(_) => "Could not play the recording.".to_string(),
            MultirecError::UploadError(_) => {
                "Upload failed. Click Upload to try again.".to_string()
            }
            MultirecError::IOError(_) => "File system error occurred.".to_string(),
            MultirecError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MultirecError>;
