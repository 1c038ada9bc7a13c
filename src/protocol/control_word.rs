//! Control word codec
//!
//! Bit layout, MSB to LSB:
//!
//! ```text
//!   7        6        5..4        3       2..0
//! [samp]   [trig]   [chs - 1]   [slope]  [prescale]
//! ```
//!
//! `samp`: 0 = real-time, 1 = equivalent-time. `trig`: 0 = auto, 1 = normal.
//! `slope`: 0 = falling, 1 = rising.
//!
//! Both directions are total. Decoding trusts the device: any byte maps to a
//! structurally valid config, and instrument-level validity is checked only
//! before the host sends a config back.

use crate::types::{AcquisitionConfig, SamplingMode, TriggerMode, TriggerSlope};

const SAMPLING_SHIFT: u8 = 7;
const TRIGGER_SHIFT: u8 = 6;
const CHANNELS_SHIFT: u8 = 4;
const CHANNELS_MASK: u8 = 0b11;
const SLOPE_SHIFT: u8 = 3;
const PRESCALE_MASK: u8 = 0b111;

/// Pack a config into its wire byte
pub fn encode(config: &AcquisitionConfig) -> u8 {
    let samp: u8 = match config.sampling_mode {
        SamplingMode::RealTime => 0,
        SamplingMode::EquivalentTime => 1,
    };
    let trig: u8 = match config.trigger_mode {
        TriggerMode::Auto => 0,
        TriggerMode::Normal => 1,
    };
    let slope: u8 = match config.trigger_slope {
        TriggerSlope::Falling => 0,
        TriggerSlope::Rising => 1,
    };
    let chs = config.channel_count.wrapping_sub(1) & CHANNELS_MASK;

    (samp << SAMPLING_SHIFT)
        | (trig << TRIGGER_SHIFT)
        | (chs << CHANNELS_SHIFT)
        | (slope << SLOPE_SHIFT)
        | (config.prescale & PRESCALE_MASK)
}

/// Unpack a wire byte into a config
pub fn decode(word: u8) -> AcquisitionConfig {
    AcquisitionConfig {
        sampling_mode: if (word >> SAMPLING_SHIFT) & 1 == 1 {
            SamplingMode::EquivalentTime
        } else {
            SamplingMode::RealTime
        },
        trigger_mode: if (word >> TRIGGER_SHIFT) & 1 == 1 {
            TriggerMode::Normal
        } else {
            TriggerMode::Auto
        },
        channel_count: ((word >> CHANNELS_SHIFT) & CHANNELS_MASK) + 1,
        trigger_slope: if (word >> SLOPE_SHIFT) & 1 == 1 {
            TriggerSlope::Rising
        } else {
            TriggerSlope::Falling
        },
        prescale: word & PRESCALE_MASK,
    }
}
