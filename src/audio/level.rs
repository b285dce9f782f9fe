//! Input level history
//!
//! Capture callbacks push one peak per audio block; the UI reads the recent
//! peaks to draw a live waveform for each recording source.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of peaks kept for display
pub const LEVEL_HISTORY: usize = 64;

/// Largest absolute amplitude in a block, clamped to 0.0..=1.0
pub fn peak(samples: impl IntoIterator<Item = f32>) -> f32 {
    samples
        .into_iter()
        .fold(0.0f32, |max, sample| max.max(sample.abs()))
        .min(1.0)
}

/// Rolling window of block peaks, shared between a stream and the UI
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    peaks: Arc<Mutex<VecDeque<f32>>>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            peaks: Arc::new(Mutex::new(VecDeque::with_capacity(LEVEL_HISTORY))),
        }
    }

    pub fn push_peak(&self, value: f32) {
        let mut peaks = self.peaks.lock();
        if peaks.len() >= LEVEL_HISTORY {
            peaks.pop_front();
        }
        peaks.push_back(value.clamp(0.0, 1.0));
    }

    /// Record the peak of one block of samples
    pub fn push_block(&self, samples: &[f32]) {
        self.push_peak(peak(samples.iter().copied()));
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        self.peaks.lock().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.peaks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_of_block() {
        assert_eq!(peak([0.1, -0.5, 0.3]), 0.5);
        assert_eq!(peak([2.0, -0.1]), 1.0);
        assert_eq!(peak(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_meter_keeps_recent_history() {
        let meter = LevelMeter::new();
        for i in 0..LEVEL_HISTORY + 10 {
            meter.push_peak(i as f32 / 1000.0);
        }

        let peaks = meter.snapshot();
        assert_eq!(peaks.len(), LEVEL_HISTORY);
        assert_eq!(peaks[0], 10.0 / 1000.0);
        assert_eq!(*peaks.last().unwrap(), (LEVEL_HISTORY + 9) as f32 / 1000.0);
    }

    #[test]
    fn test_meter_blocks_and_clear() {
        let meter = LevelMeter::new();
        let clone = meter.clone();

        meter.push_block(&[0.25, -0.75]);
        meter.push_peak(-3.0);
        assert_eq!(clone.snapshot(), vec![0.75, 0.0]);

        clone.clear();
        assert!(meter.snapshot().is_empty());
    }
}
