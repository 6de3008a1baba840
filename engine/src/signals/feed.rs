//! Telemetry sources and the polling feed loop
//!
//! The feed is the single writer of signal state: a spawned task owns the
//! aggregator, polls a [`TelemetrySource`] on a fixed interval and publishes
//! snapshot clones on a `tokio::sync::watch` channel. Readers only ever hold
//! a receiver. Per-tick source errors are logged and skipped so malformed
//! telemetry never propagates past this module.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregator::SignalAggregator;
use super::{SignalChannel, SignalSnapshot, TelemetryFrame};
use crate::errors::EngineError;

/// Probability per tick that the simulator flips one flag.
const SIMULATED_FLAG_FLIP_CHANCE: f64 = 0.08;

/// A producer of telemetry frames, polled at a fixed interval.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Short source name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Produce the next partial frame.
    async fn next_frame(&mut self) -> Result<TelemetryFrame, EngineError>;
}

/// Simulated generator: one random channel value per poll (0-100, one
/// decimal) and an occasional flag flip so the rule paths get exercised
/// without a device attached.
pub struct SimulatedSource {
    rng: StdRng,
}

impl SimulatedSource {
    /// Create a simulator seeded from entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a simulator with a fixed seed, for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn next_frame(&mut self) -> Result<TelemetryFrame, EngineError> {
        let value = (self.rng.gen_range(0.0f64..100.0) * 10.0).round() / 10.0;
        let channel = SignalChannel::ALL[self.rng.gen_range(0..SignalChannel::ALL.len())];

        let mut frame = TelemetryFrame::default();
        match channel {
            SignalChannel::Noise => frame.noise = Some(value),
            SignalChannel::NearFace => frame.near_face = Some(value),
            SignalChannel::MouthOpen => frame.mouth_open = Some(value),
            SignalChannel::BlinkRate => frame.blink_rate = Some(value),
            SignalChannel::HeartRate => frame.heart_rate = Some(value),
        }

        if self.rng.gen_bool(SIMULATED_FLAG_FLIP_CHANCE) {
            let on = self.rng.gen_bool(0.5);
            match self.rng.gen_range(0..4) {
                0 => frame.sensory_overload = Some(on),
                1 => frame.high_noise = Some(on),
                2 => frame.hunger = Some(on),
                _ => frame.needs_rest = Some(on),
            }
        }

        Ok(frame)
    }
}

/// Polled external sensor feed: GETs a configured URL and expects a JSON
/// [`TelemetryFrame`]. Transport and decode failures surface as
/// [`EngineError::Telemetry`] and are skipped by the loop.
pub struct PolledSource {
    url: String,
    client: reqwest::Client,
}

impl PolledSource {
    /// Create a polled source for the given feed URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TelemetrySource for PolledSource {
    fn name(&self) -> &str {
        "polled"
    }

    async fn next_frame(&mut self) -> Result<TelemetryFrame, EngineError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::Telemetry(format!("feed request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Telemetry(format!(
                "feed returned status {}",
                response.status()
            )));
        }

        response
            .json::<TelemetryFrame>()
            .await
            .map_err(|e| EngineError::Telemetry(format!("malformed feed frame: {e}")))
    }
}

/// Run the polling feed loop until cancelled.
///
/// Owns the aggregator for its lifetime; every applied frame is published
/// as a fresh snapshot on the watch channel.
pub async fn run_feed(
    mut source: Box<dyn TelemetrySource>,
    mut aggregator: SignalAggregator,
    snapshot_tx: watch::Sender<SignalSnapshot>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(source = source.name(), interval_ms = poll_interval.as_millis() as u64, "telemetry feed started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.next_frame().await {
                    Ok(frame) => {
                        let snapshot = aggregator.apply_frame(&frame, Utc::now());
                        debug!(quality = snapshot.quality, "telemetry frame applied");
                        // Receivers may all be gone during shutdown; not an error.
                        let _ = snapshot_tx.send(snapshot);
                    }
                    Err(err) => {
                        warn!(source = source.name(), error = %err, "telemetry poll failed, skipping tick");
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("telemetry feed shutting down");
                break;
            }
        }
    }
}
