//! Behavioral telemetry data model
//!
//! A [`SignalSample`] is one raw measurement on one channel. The
//! [`crate::signals::aggregator::SignalAggregator`] folds samples into a
//! [`SignalSnapshot`], the read-only view every consumer works from. A
//! [`TelemetryFrame`] is what a source yields per poll: a partial record
//! where absent fields mean "no new data", never zero.

pub mod aggregator;
pub mod feed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One tracked category of behavioral telemetry.
///
/// The declaration order is the stable textual order used wherever channel
/// observations are enumerated (the derived `Ord` follows it).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SignalChannel {
    /// Ambient noise level (0-100)
    Noise,
    /// Face proximity / gaze-near-face score (0-100)
    NearFace,
    /// Mouth-open percentage (0-100)
    MouthOpen,
    /// Blinks per minute
    BlinkRate,
    /// Heart rate in beats per minute
    HeartRate,
}

impl SignalChannel {
    /// All channels in the stable enumeration order.
    pub const ALL: [SignalChannel; 5] = [
        SignalChannel::Noise,
        SignalChannel::NearFace,
        SignalChannel::MouthOpen,
        SignalChannel::BlinkRate,
        SignalChannel::HeartRate,
    ];

    /// The kebab-case label used in serialized form and in rule output.
    pub fn label(self) -> &'static str {
        match self {
            SignalChannel::Noise => "noise",
            SignalChannel::NearFace => "near-face",
            SignalChannel::MouthOpen => "mouth-open",
            SignalChannel::BlinkRate => "blink-rate",
            SignalChannel::HeartRate => "heart-rate",
        }
    }
}

impl fmt::Display for SignalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One raw measurement. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Which channel it belongs to
    pub channel: SignalChannel,
    /// Bounded numeric measurement (0-100 for percentages, positive counts otherwise)
    pub value: f64,
}

impl SignalSample {
    /// Create a sample stamped with the given time.
    pub fn new(timestamp: DateTime<Utc>, channel: SignalChannel, value: f64) -> Self {
        Self {
            timestamp,
            channel,
            value,
        }
    }
}

/// Boolean state flags derived from or toggled alongside the raw channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalFlags {
    /// Sensory overload perceived
    pub sensory_overload: bool,
    /// High ambient noise
    pub high_noise: bool,
    /// Hunger signal
    pub hunger: bool,
    /// Need for rest
    pub needs_rest: bool,
}

impl SignalFlags {
    /// Logical OR of two flag sets. Manual session toggles are merged over
    /// the shared feed flags this way.
    pub fn merge(self, other: SignalFlags) -> SignalFlags {
        SignalFlags {
            sensory_overload: self.sensory_overload || other.sensory_overload,
            high_noise: self.high_noise || other.high_noise,
            hunger: self.hunger || other.hunger,
            needs_rest: self.needs_rest || other.needs_rest,
        }
    }

    /// True if any flag is raised.
    pub fn any(self) -> bool {
        self.sensory_overload || self.high_noise || self.hunger || self.needs_rest
    }

    /// Set a flag by its short name. Returns false for unknown names.
    ///
    /// Accepted names: `overload`, `noise`, `hunger`, `rest`.
    pub fn set_by_name(&mut self, name: &str, on: bool) -> bool {
        match name {
            "overload" => self.sensory_overload = on,
            "noise" => self.high_noise = on,
            "hunger" => self.hunger = on,
            "rest" => self.needs_rest = on,
            _ => return false,
        }
        true
    }
}

/// The latest known value per channel plus a smoothed quality score.
///
/// Owned exclusively by the aggregator; everyone else receives clones
/// through a watch channel and never mutates them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// Current best-known value per channel (absent = never reported)
    pub values: BTreeMap<SignalChannel, f64>,
    /// Current flag state
    pub flags: SignalFlags,
    /// Smoothed quality score, always within [0,1]
    pub quality: f64,
    /// Timestamp of the most recent accepted sample
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial record yielded by one telemetry poll.
///
/// Every field is optional: an absent field means the source has no new
/// data for it, and the prior value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryFrame {
    /// New noise level, if any
    pub noise: Option<f64>,
    /// New near-face score, if any
    pub near_face: Option<f64>,
    /// New mouth-open percentage, if any
    pub mouth_open: Option<f64>,
    /// New blink rate, if any
    pub blink_rate: Option<f64>,
    /// New heart rate, if any
    pub heart_rate: Option<f64>,
    /// Overload flag update, if any
    pub sensory_overload: Option<bool>,
    /// High-noise flag update, if any
    pub high_noise: Option<bool>,
    /// Hunger flag update, if any
    pub hunger: Option<bool>,
    /// Needs-rest flag update, if any
    pub needs_rest: Option<bool>,
}

impl TelemetryFrame {
    /// The channel values present in this frame, in channel order.
    pub fn channel_values(&self) -> Vec<(SignalChannel, f64)> {
        let pairs = [
            (SignalChannel::Noise, self.noise),
            (SignalChannel::NearFace, self.near_face),
            (SignalChannel::MouthOpen, self.mouth_open),
            (SignalChannel::BlinkRate, self.blink_rate),
            (SignalChannel::HeartRate, self.heart_rate),
        ];
        pairs
            .into_iter()
            .filter_map(|(channel, value)| value.map(|v| (channel, v)))
            .collect()
    }
}
