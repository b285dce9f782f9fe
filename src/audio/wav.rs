use crate::{MultirecError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Encode interleaved f32 samples as a 16-bit PCM WAV file in memory
///
/// # Arguments
/// * `samples` - Interleaved samples (f32, range -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Number of interleaved channels
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| MultirecError::EncodingError(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| MultirecError::EncodingError(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| MultirecError::EncodingError(format!("Failed to finalize WAV data: {}", e)))?;
    }

    let bytes = cursor.into_inner();
    debug!(
        "Encoded {} samples ({}Hz, {} ch) into {} bytes",
        samples.len(),
        sample_rate,
        channels,
        bytes.len()
    );
    Ok(bytes)
}

/// Duration in seconds of an in-memory WAV file
pub fn wav_duration_secs(bytes: &[u8]) -> Result<f32> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| MultirecError::EncodingError(format!("Failed to read WAV header: {}", e)))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    // `duration` counts frames, not interleaved samples
    Ok(reader.duration() as f32 / spec.sample_rate as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_mono() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();

        let bytes = encode_wav(&samples, 16000, 1).unwrap();

        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header plus two bytes per sample
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
        assert!((wav_duration_secs(&bytes).unwrap() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_encode_stereo_duration() {
        let samples = vec![0.25f32; 48000 * 2];

        let bytes = encode_wav(&samples, 48000, 2).unwrap();

        let reader = WavReader::new(Cursor::new(&bytes[..])).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert!((wav_duration_secs(&bytes).unwrap() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let bytes = encode_wav(&[2.0, -2.0], 8000, 1).unwrap();

        let mut reader = WavReader::new(Cursor::new(&bytes[..])).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_empty_recording_is_valid_wav() {
        let bytes = encode_wav(&[], 44100, 1).unwrap();
        assert_eq!(wav_duration_secs(&bytes).unwrap(), 0.0);
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert!(wav_duration_secs(b"not a wav file").is_err());
    }
}
