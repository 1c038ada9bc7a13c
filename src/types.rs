//! Core data types for ascope-rs
//!
//! This module contains the data structures shared by the protocol layer,
//! the resampling engine and the acquisition state machine.
//!
//! # Main Types
//!
//! - [`AcquisitionConfig`] - The instrument's acquisition settings (mode, trigger, channels, prescale)
//! - [`Frame`] - One synchronized unit of link data
//! - [`RawBuffer`] / [`VoltageBuffer`] - Per-channel sample storage
//! - [`ZoomState`] - Display magnification and interpolation mode
//!
//! # Buffer Shape
//!
//! Every channel always holds exactly [`SAMPLES_PER_CHANNEL`] samples. Buffers
//! are stored channel-major, matching the order samples arrive on the wire.

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};

/// Samples per channel in one acquisition (N)
pub const SAMPLES_PER_CHANNEL: usize = 256;

/// Maximum number of channels the operator may select
pub const MAX_CHANNELS: u8 = 2;

/// Maximum channel count expressible by the two control word bits
pub const WIRE_MAX_CHANNELS: u8 = 4;

/// Maximum time zoom power (factor 2^8); may not exceed log2(N)
pub const MAX_ZOOM_POWER: u8 = 8;

/// Largest prescale value the three control word bits can hold
pub const MAX_PRESCALE: u8 = 7;

/// Sampling method of the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Consecutive ADC conversions after a trigger
    #[default]
    RealTime,
    /// Repetitive sampling with a shifting delay after each trigger
    EquivalentTime,
}

impl SamplingMode {
    /// Single-letter tag used in the status line
    pub fn tag(&self) -> char {
        match self {
            SamplingMode::RealTime => 'R',
            SamplingMode::EquivalentTime => 'E',
        }
    }

    /// Valid prescale range for this mode
    pub fn prescale_range(&self) -> std::ops::RangeInclusive<u8> {
        match self {
            SamplingMode::RealTime => 2..=7,
            SamplingMode::EquivalentTime => 1..=5,
        }
    }

    /// Prescale that selects the fastest sampling rate in this mode
    pub fn fastest_prescale(&self) -> u8 {
        *self.prescale_range().start()
    }
}

/// Trigger behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Free-running acquisition when no trigger arrives (real-time only)
    Auto,
    /// Wait for a trigger edge
    #[default]
    Normal,
}

/// Trigger edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSlope {
    /// Falling edge
    Falling,
    /// Rising edge
    #[default]
    Rising,
}

/// Acquisition settings as reported by, and sent to, the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Sampling method
    pub sampling_mode: SamplingMode,
    /// Trigger behaviour
    pub trigger_mode: TriggerMode,
    /// Number of active channels (1..=WIRE_MAX_CHANNELS)
    pub channel_count: u8,
    /// Trigger edge
    pub trigger_slope: TriggerSlope,
    /// Timer clock (ET) or ADC clock (RT) prescale selector
    pub prescale: u8,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sampling_mode: SamplingMode::RealTime,
            trigger_mode: TriggerMode::Normal,
            channel_count: 1,
            trigger_slope: TriggerSlope::Rising,
            prescale: 2,
        }
    }
}

impl AcquisitionConfig {
    /// Create a config, checking the structural limits of the control word
    ///
    /// This only rejects values the wire format cannot carry. Whether the
    /// instrument can run the config is checked by [`AcquisitionConfig::validate`].
    pub fn new(
        sampling_mode: SamplingMode,
        trigger_mode: TriggerMode,
        channel_count: u8,
        trigger_slope: TriggerSlope,
        prescale: u8,
    ) -> Result<Self> {
        if !(1..=WIRE_MAX_CHANNELS).contains(&channel_count) {
            return Err(ScopeError::InvalidConfig(format!(
                "channel count {} outside 1..={}",
                channel_count, WIRE_MAX_CHANNELS
            )));
        }
        if prescale > MAX_PRESCALE {
            return Err(ScopeError::InvalidConfig(format!(
                "prescale {} outside 0..={}",
                prescale, MAX_PRESCALE
            )));
        }
        Ok(Self {
            sampling_mode,
            trigger_mode,
            channel_count,
            trigger_slope,
            prescale,
        })
    }

    /// Check that the instrument can be asked to run this config
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CHANNELS).contains(&self.channel_count) {
            return Err(ScopeError::InvalidConfig(format!(
                "channel count {} outside 1..={}",
                self.channel_count, MAX_CHANNELS
            )));
        }
        let range = self.sampling_mode.prescale_range();
        if !range.contains(&self.prescale) {
            return Err(ScopeError::InvalidConfig(format!(
                "prescale {} outside {}..={} for {:?}",
                self.prescale,
                range.start(),
                range.end(),
                self.sampling_mode
            )));
        }
        if self.trigger_mode == TriggerMode::Auto
            && self.sampling_mode == SamplingMode::EquivalentTime
        {
            return Err(ScopeError::InvalidConfig(
                "auto trigger requires real-time sampling".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between consecutive samples in microseconds
    ///
    /// Returns `None` when the prescale has no meaning in the current mode.
    pub fn sample_period_us(&self) -> Option<f64> {
        match self.sampling_mode {
            SamplingMode::EquivalentTime => {
                const DIVISORS: [u32; 5] = [1, 8, 64, 256, 1024];
                let index = usize::from(self.prescale).checked_sub(1)?;
                DIVISORS.get(index).map(|&d| f64::from(d) / 16.0)
            }
            SamplingMode::RealTime => Some(f64::from(13u32 << self.prescale) / 16.0),
        }
    }

    /// Trigger indicator used in the status line (`/`, `\` or `A`)
    pub fn trigger_symbol(&self) -> char {
        match (self.trigger_mode, self.trigger_slope) {
            (TriggerMode::Auto, _) => 'A',
            (TriggerMode::Normal, TriggerSlope::Rising) => '/',
            (TriggerMode::Normal, TriggerSlope::Falling) => '\\',
        }
    }

    /// Number of payload bytes a ready frame carries for this config
    pub fn payload_len(&self) -> usize {
        usize::from(self.channel_count) * SAMPLES_PER_CHANNEL
    }
}

/// Raw ADC samples, one byte per sample, channel-major
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBuffer {
    channels: Vec<Vec<u8>>,
}

impl RawBuffer {
    /// Build a buffer from per-channel samples
    ///
    /// Every channel must hold exactly [`SAMPLES_PER_CHANNEL`] samples.
    pub fn from_channels(channels: Vec<Vec<u8>>) -> Result<Self> {
        if channels.is_empty() {
            return Err(ScopeError::InvalidConfig("raw buffer has no channels".into()));
        }
        if let Some(bad) = channels.iter().find(|c| c.len() != SAMPLES_PER_CHANNEL) {
            return Err(ScopeError::InvalidConfig(format!(
                "raw channel holds {} samples, expected {}",
                bad.len(),
                SAMPLES_PER_CHANNEL
            )));
        }
        Ok(Self { channels })
    }

    /// Split a channel-major payload into channels
    pub(crate) fn from_payload(payload: &[u8]) -> Self {
        Self {
            channels: payload
                .chunks_exact(SAMPLES_PER_CHANNEL)
                .map(<[u8]>::to_vec)
                .collect(),
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[u8]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Iterate over channels
    pub fn channels(&self) -> impl Iterator<Item = &[u8]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Convert to voltages using the given input range
    pub fn to_voltages(&self, range: &VoltageRange) -> VoltageBuffer {
        VoltageBuffer {
            channels: self
                .channels
                .iter()
                .map(|c| c.iter().map(|&s| range.to_voltage(s)).collect())
                .collect(),
        }
    }
}

/// Per-channel voltages, channel-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageBuffer {
    channels: Vec<Vec<f64>>,
}

impl VoltageBuffer {
    /// Build a buffer from per-channel voltages
    pub fn from_channels(channels: Vec<Vec<f64>>) -> Self {
        Self { channels }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Voltages of one channel
    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Iterate over channels
    pub fn channels(&self) -> impl Iterator<Item = &[f64]> {
        self.channels.iter().map(Vec::as_slice)
    }
}

/// Input voltage range of the instrument's front end
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageRange {
    /// Voltage for ADC reading 0
    pub v_min: f64,
    /// Voltage for ADC reading 255
    pub v_max: f64,
}

impl Default for VoltageRange {
    fn default() -> Self {
        Self {
            v_min: -5.0,
            v_max: 5.0,
        }
    }
}

impl VoltageRange {
    /// Map a raw ADC byte onto the voltage range
    pub fn to_voltage(&self, raw: u8) -> f64 {
        let t = f64::from(raw) / 255.0;
        self.v_min + (self.v_max - self.v_min) * t
    }

    /// Full span in volts
    pub fn span(&self) -> f64 {
        self.v_max - self.v_min
    }
}

/// One synchronized unit of link data
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Config reported by the device
    pub config: AcquisitionConfig,
    /// Whether the frame carries a complete acquisition
    pub ready: bool,
    /// Samples, present only on ready frames
    pub samples: Option<RawBuffer>,
}

/// Interpolation used when the trace is magnified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Straight lines between samples
    Linear,
    /// Band-limited reconstruction
    #[default]
    Sinc,
}

impl Interpolation {
    /// Single-letter tag used in the status line
    pub fn tag(&self) -> char {
        match self {
            Interpolation::Linear => 'L',
            Interpolation::Sinc => 'S',
        }
    }

    /// The other mode
    pub fn toggled(&self) -> Self {
        match self {
            Interpolation::Linear => Interpolation::Sinc,
            Interpolation::Sinc => Interpolation::Linear,
        }
    }
}

/// Time magnification of the displayed trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ZoomState {
    power: u8,
    /// Interpolation used when the factor is above one
    pub interpolation: Interpolation,
}

impl ZoomState {
    /// Create a zoom state, clamping the power to [`MAX_ZOOM_POWER`]
    pub fn new(power: u8, interpolation: Interpolation) -> Self {
        Self {
            power: power.min(MAX_ZOOM_POWER),
            interpolation,
        }
    }

    /// Zoom exponent
    pub fn power(&self) -> u8 {
        self.power
    }

    /// Zoom factor, 2^power
    pub fn factor(&self) -> usize {
        1 << self.power
    }

    /// Step the power by `delta`, clamped to the valid range
    pub fn step(&mut self, delta: i8) {
        let next = i16::from(self.power) + i16::from(delta);
        self.power = next.clamp(0, i16::from(MAX_ZOOM_POWER)) as u8;
    }
}
