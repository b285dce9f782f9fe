//! cpal capture backend
//!
//! Devices are identified by their cpal name. Each capture stream feeds a
//! level meter and a shared tap; a recorder attaches its take to the tap,
//! collects samples while not paused and encodes a WAV file on a worker
//! thread when stopped or when the device goes away.

use super::backend::{
    CaptureStream, Container, DeviceRecord, MediaBackend, MediaRecorder, PermissionState,
    RecorderEvent, RecorderSink, StreamConstraints,
};
use super::level::{self, LevelMeter};
use super::wav::encode_wav;
use crate::{MultirecError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, Sample, SizedSample, Stream, StreamConfig, StreamError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Samples of one recording and where to deliver them
struct Take {
    samples: Mutex<Vec<f32>>,
    paused: AtomicBool,
    finished: AtomicBool,
    sink: RecorderSink,
    sample_rate: u32,
    channels: u16,
}

impl Take {
    fn new(sink: RecorderSink, sample_rate: u32, channels: u16) -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            sink,
            sample_rate,
            channels,
        })
    }

    fn push<T>(&self, data: &[T])
    where
        T: Sample,
        f32: FromSample<T>,
    {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }
        let mut samples = self.samples.lock();
        samples.extend(data.iter().map(|&s| f32::from_sample(s)));
    }

    /// Encode on a worker thread, then report `Stopped`. Only the first call
    /// does anything.
    fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }

        let samples = std::mem::take(&mut *self.samples.lock());
        let sink = self.sink.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let spawned = std::thread::Builder::new()
            .name(format!("multirec-encoder-{}", self.sink.slot()))
            .spawn(move || {
                match encode_wav(&samples, sample_rate, channels) {
                    Ok(bytes) => {
                        sink.emit(RecorderEvent::DataAvailable(bytes));
                    }
                    Err(e) => {
                        sink.emit(RecorderEvent::Error(e.to_string()));
                    }
                }
                sink.emit(RecorderEvent::Stopped);
            });

        if let Err(e) = spawned {
            error!("Failed to spawn encoder thread: {}", e);
            self.sink
                .emit(RecorderEvent::Error(format!("Failed to encode recording: {}", e)));
            self.sink.emit(RecorderEvent::Stopped);
        }
    }
}

type SharedTap = Arc<Mutex<Option<Arc<Take>>>>;

/// Media backend over the default cpal host
pub struct CpalBackend {
    host: Host,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        let host = cpal::default_host();
        info!("Using audio host: {:?}", host.id());
        Self { host }
    }

    fn find_input(&self, device_id: &str) -> Result<Device> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| MultirecError::AudioDeviceError(format!("Failed to list input devices: {}", e)))?;

        for device in devices {
            if device.name().map(|name| name == device_id).unwrap_or(false) {
                return Ok(device);
            }
        }

        Err(MultirecError::AudioDeviceError(format!(
            "Requested device not found: {}",
            device_id
        )))
    }
}

impl MediaBackend for CpalBackend {
    fn permission_state(&self) -> PermissionState {
        // cpal has no permission query; the OS asks when a stream is opened
        PermissionState::Granted
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceRecord>> {
        let inputs = self
            .host
            .input_devices()
            .map_err(|e| MultirecError::AudioDeviceError(format!("Failed to list input devices: {}", e)))?;
        let outputs = self
            .host
            .output_devices()
            .map_err(|e| MultirecError::AudioDeviceError(format!("Failed to list output devices: {}", e)))?;

        let mut records: Vec<DeviceRecord> = inputs
            .filter_map(|device| device.name().ok())
            .map(|name| DeviceRecord::input(name.clone(), name))
            .collect();
        records.extend(
            outputs
                .filter_map(|device| device.name().ok())
                .map(|name| DeviceRecord::output(name.clone(), name)),
        );

        Ok(records)
    }

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>> {
        let device = match &constraints.device_id {
            Some(id) => self.find_input(id)?,
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| MultirecError::AudioDeviceError("No input device available".into()))?,
        };
        let device_id = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device.default_input_config().map_err(|e| {
            MultirecError::AudioDeviceError(format!("Failed to get input config: {}", e))
        })?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        info!(
            "Opening {}: {}Hz, {} channel(s), {:?}",
            device_id, config.sample_rate.0, config.channels, sample_format
        );

        let tap: SharedTap = Arc::new(Mutex::new(None));
        let levels = LevelMeter::new();
        let input = InputTarget {
            device_id: device_id.clone(),
            tap: Arc::clone(&tap),
            levels: levels.clone(),
        };
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config, input),
            cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config, input),
            cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config, input),
            cpal::SampleFormat::I32 => build_input_stream::<i32>(&device, &config, input),
            other => Err(MultirecError::AudioDeviceError(format!(
                "Unsupported sample format '{}'",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| MultirecError::CaptureError(format!("Failed to start input stream: {}", e)))?;

        Ok(Box::new(CpalStream {
            device_id,
            stream: Some(stream),
            tap,
            levels,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        }))
    }
}

/// What the cpal callbacks write into
struct InputTarget {
    device_id: String,
    tap: SharedTap,
    levels: LevelMeter,
}

fn build_input_stream<T>(device: &Device, config: &StreamConfig, input: InputTarget) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let InputTarget {
        device_id,
        tap,
        levels,
    } = input;
    let data_tap = Arc::clone(&tap);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                levels.push_peak(level::peak(data.iter().map(|&s| f32::from_sample(s))));
                if let Some(take) = data_tap.lock().as_ref() {
                    take.push(data);
                }
            },
            move |err: StreamError| handle_stream_error(&device_id, &tap, err),
            None,
        )
        .map_err(|e| MultirecError::CaptureError(format!("Failed to build input stream: {}", e)))
}

/// A lost device ends the attached take so the slot can finalize
fn handle_stream_error(device_id: &str, tap: &SharedTap, err: StreamError) {
    error!("Audio input stream error on {}: {}", device_id, err);
    if !matches!(err, StreamError::DeviceNotAvailable) {
        return;
    }

    let take = tap.lock().take();
    if let Some(take) = take {
        warn!("{} disappeared while recording source {}", device_id, take.sink.slot() + 1);
        take.sink
            .emit(RecorderEvent::Error(format!("Input device lost: {}", err)));
        take.finish();
    }
}

/// A running cpal input stream
pub struct CpalStream {
    device_id: String,
    stream: Option<Stream>,
    tap: SharedTap,
    levels: LevelMeter,
    sample_rate: u32,
    channels: u16,
}

impl CaptureStream for CpalStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn levels(&self) -> Vec<f32> {
        if self.stream.is_some() {
            self.levels.snapshot()
        } else {
            Vec::new()
        }
    }

    fn create_recorder(&mut self, sink: RecorderSink) -> Result<Box<dyn MediaRecorder>> {
        if self.stream.is_none() {
            return Err(MultirecError::RecorderError(format!(
                "Stream for {} is no longer active",
                self.device_id
            )));
        }
        Ok(Box::new(WavRecorder {
            tap: Arc::clone(&self.tap),
            take: Take::new(sink, self.sample_rate, self.channels),
            running: false,
        }))
    }

    fn stop(&mut self) {
        self.tap.lock().take();
        if let Some(stream) = self.stream.take() {
            drop(stream);
            self.levels.clear();
            info!("Released input stream on {}", self.device_id);
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Collects PCM from a stream and produces a WAV artifact
pub struct WavRecorder {
    tap: SharedTap,
    take: Arc<Take>,
    running: bool,
}

impl MediaRecorder for WavRecorder {
    fn container(&self) -> Container {
        Container::Wav
    }

    fn start(&mut self) -> Result<()> {
        if self.running {
            warn!("Recorder already running, ignoring start request");
            return Ok(());
        }
        if self.take.finished.load(Ordering::SeqCst) {
            return Err(MultirecError::RecorderError(
                "Recorder has already delivered its recording".into(),
            ));
        }
        self.take.paused.store(false, Ordering::SeqCst);
        *self.tap.lock() = Some(Arc::clone(&self.take));
        self.running = true;
        debug!("Recorder attached for slot {}", self.take.sink.slot());
        Ok(())
    }

    fn pause(&mut self) {
        self.take.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.take.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.tap.lock().take();
        self.take.finish();
    }
}
