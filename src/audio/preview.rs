use crate::slot::Artifact;
use crate::{MultirecError, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use tracing::{debug, info};

/// Plays back a finished recording on the default output device
///
/// The output stream is opened on first use and kept for the session.
pub struct PreviewPlayer {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    playing_slot: Option<usize>,
}

impl Default for PreviewPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewPlayer {
    pub fn new() -> Self {
        Self {
            output: None,
            sink: None,
            playing_slot: None,
        }
    }

    /// Start playing `artifact`, replacing whatever was playing
    pub fn play(&mut self, slot: usize, artifact: &Artifact) -> Result<()> {
        self.stop();

        let decoder = Decoder::new(Cursor::new(artifact.bytes().to_vec())).map_err(|e| {
            MultirecError::PlaybackError(format!(
                "Cannot decode {} recording: {}",
                artifact.mime_type(),
                e
            ))
        })?;

        let handle = self.output_handle()?;
        let sink = Sink::try_new(handle)
            .map_err(|e| MultirecError::PlaybackError(format!("Failed to create sink: {}", e)))?;
        sink.append(decoder);

        info!("Previewing source {} ({} bytes)", slot + 1, artifact.len());
        self.sink = Some(sink);
        self.playing_slot = Some(slot);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("Preview stopped");
        }
        self.playing_slot = None;
    }

    /// Slot being played, cleared once playback runs out
    pub fn playing_slot(&mut self) -> Option<usize> {
        if self.sink.as_ref().map(Sink::empty).unwrap_or(true) {
            self.sink = None;
            self.playing_slot = None;
        }
        self.playing_slot
    }

    fn output_handle(&mut self) -> Result<&OutputStreamHandle> {
        if self.output.is_none() {
            let output = OutputStream::try_default().map_err(|e| {
                MultirecError::PlaybackError(format!("No output device available: {}", e))
            })?;
            self.output = Some(output);
        }
        self.output
            .as_ref()
            .map(|(_, handle)| handle)
            .ok_or_else(|| MultirecError::PlaybackError("Output stream unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::Container;
    use crate::audio::wav::encode_wav;

    #[test]
    fn test_undecodable_artifact_is_playback_error() {
        let mut player = PreviewPlayer::new();
        let artifact = Artifact::new(b"definitely not audio".to_vec(), Container::Webm);

        let err = player.play(0, &artifact).unwrap_err();

        assert!(matches!(err, MultirecError::PlaybackError(_)));
        assert_eq!(player.playing_slot(), None);
    }

    #[test]
    fn test_play_wav() {
        // Should not panic even without an output device
        let mut player = PreviewPlayer::new();
        let bytes = encode_wav(&vec![0.0f32; 1600], 16000, 1).unwrap();
        let artifact = Artifact::new(bytes, Container::Wav);

        match player.play(2, &artifact) {
            Ok(()) => player.stop(),
            Err(e) => println!("Playback unavailable (expected in CI): {}", e),
        }
        assert_eq!(player.playing_slot(), None);
    }
}
