//! Signal aggregation and quality smoothing
//!
//! The aggregator is the single writer of the snapshot. Each accepted sample
//! updates the channel's last-known value and folds into the smoothed
//! quality score: `q = 0.9 * q + 0.1 * ok(value)`, where `ok` is 1 when the
//! value lies strictly inside the configured mid-range band. Starting from 0
//! and being a convex combination, the score stays within [0,1] at every
//! step. Malformed samples are dropped silently; they are a
//! quality-of-service concern, not a failure.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

use super::{SignalFlags, SignalSample, SignalSnapshot, TelemetryFrame};

/// Smoothing weight on the prior quality score. The remainder goes to the
/// newest observation.
const QUALITY_CARRY: f64 = 0.9;

/// Default ring-buffer capacity for diagnostic history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// Default acceptable mid-range band (open interval) on a 0-100 scale.
pub const DEFAULT_BAND: (f64, f64) = (10.0, 90.0);

/// Folds raw samples into the current [`SignalSnapshot`].
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    snapshot: SignalSnapshot,
    history: VecDeque<SignalSample>,
    capacity: usize,
    band_low: f64,
    band_high: f64,
}

impl SignalAggregator {
    /// Create an aggregator with explicit history capacity and quality band.
    pub fn new(capacity: usize, band_low: f64, band_high: f64) -> Self {
        Self {
            snapshot: SignalSnapshot::default(),
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            band_low,
            band_high,
        }
    }

    /// Ingest one sample and return the updated snapshot.
    ///
    /// Non-finite values are dropped: the stored channel value, the quality
    /// score and the history all stay untouched.
    pub fn ingest(&mut self, sample: SignalSample) -> SignalSnapshot {
        if !sample.value.is_finite() {
            debug!(
                channel = %sample.channel,
                "dropping non-finite telemetry sample"
            );
            return self.snapshot.clone();
        }

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        self.snapshot.values.insert(sample.channel, sample.value);
        let ok = if sample.value > self.band_low && sample.value < self.band_high {
            1.0
        } else {
            0.0
        };
        self.snapshot.quality = QUALITY_CARRY * self.snapshot.quality + (1.0 - QUALITY_CARRY) * ok;
        self.snapshot.updated_at = Some(sample.timestamp);

        self.snapshot.clone()
    }

    /// Replace the flag set. Feed flags are authoritative for the shared
    /// layer; manual per-session toggles are merged later by the controller.
    pub fn observe_flags(&mut self, flags: SignalFlags) {
        self.snapshot.flags = flags;
    }

    /// Apply one polled frame: each present channel value becomes a sample,
    /// each present flag replaces that flag. Absent fields keep prior state.
    pub fn apply_frame(&mut self, frame: &TelemetryFrame, now: DateTime<Utc>) -> SignalSnapshot {
        for (channel, value) in frame.channel_values() {
            self.ingest(SignalSample::new(now, channel, value));
        }

        let flags = &mut self.snapshot.flags;
        if let Some(on) = frame.sensory_overload {
            flags.sensory_overload = on;
        }
        if let Some(on) = frame.high_noise {
            flags.high_noise = on;
        }
        if let Some(on) = frame.hunger {
            flags.hunger = on;
        }
        if let Some(on) = frame.needs_rest {
            flags.needs_rest = on;
        }

        self.snapshot.clone()
    }

    /// Read-only copy of the current snapshot.
    pub fn snapshot(&self) -> SignalSnapshot {
        self.snapshot.clone()
    }

    /// Buffered historical samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &SignalSample> {
        self.history.iter()
    }

    /// Number of buffered historical samples.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_BAND.0, DEFAULT_BAND.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalChannel;

    fn sample(value: f64) -> SignalSample {
        SignalSample::new(Utc::now(), SignalChannel::Noise, value)
    }

    #[test]
    fn test_quality_smoothing_step() {
        let mut agg = SignalAggregator::default();
        let snap = agg.ingest(sample(50.0));
        assert!((snap.quality - 0.1).abs() < 1e-12);

        let snap = agg.ingest(sample(95.0));
        assert!((snap.quality - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_band_is_open_interval() {
        let mut agg = SignalAggregator::default();
        // Boundary values count as out of band.
        agg.ingest(sample(10.0));
        assert_eq!(agg.snapshot().quality, 0.0);
        agg.ingest(sample(90.0));
        assert_eq!(agg.snapshot().quality, 0.0);
        // Just inside counts.
        let snap = agg.ingest(sample(10.1));
        assert!(snap.quality > 0.0);
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let mut agg = SignalAggregator::default();
        agg.ingest(sample(50.0));
        let before = agg.snapshot();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let after = agg.ingest(sample(bad));
            assert_eq!(after, before);
        }
        assert_eq!(agg.history_len(), 1);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest_first() {
        let mut agg = SignalAggregator::new(3, 10.0, 90.0);
        for value in [1.0, 2.0, 3.0, 4.0] {
            agg.ingest(sample(value));
        }
        let values: Vec<f64> = agg.history().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_apply_frame_keeps_absent_channels() {
        let mut agg = SignalAggregator::default();
        agg.ingest(SignalSample::new(Utc::now(), SignalChannel::HeartRate, 72.0));

        let frame = TelemetryFrame {
            noise: Some(40.0),
            sensory_overload: Some(true),
            ..Default::default()
        };
        let snap = agg.apply_frame(&frame, Utc::now());

        assert_eq!(snap.values.get(&SignalChannel::HeartRate), Some(&72.0));
        assert_eq!(snap.values.get(&SignalChannel::Noise), Some(&40.0));
        assert!(snap.flags.sensory_overload);

        // A later frame without the flag keeps it raised.
        let snap = agg.apply_frame(&TelemetryFrame::default(), Utc::now());
        assert!(snap.flags.sensory_overload);
    }

    #[test]
    fn test_quality_converges_under_steady_streams() {
        let mut agg = SignalAggregator::default();
        for _ in 0..200 {
            agg.ingest(sample(50.0));
        }
        assert!(agg.snapshot().quality > 0.99);

        for _ in 0..200 {
            agg.ingest(sample(95.0));
        }
        assert!(agg.snapshot().quality < 0.01);
    }
}
