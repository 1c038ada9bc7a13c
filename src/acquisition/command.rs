//! Operator commands and the retune rules applied to them

use crate::types::{
    AcquisitionConfig, Interpolation, SamplingMode, TriggerMode, TriggerSlope, MAX_CHANNELS,
};

/// Abstract operator commands, produced by an input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Select the number of active channels
    SetChannelCount(u8),
    /// Trigger on the given edge (implies normal triggering)
    SetSlope(TriggerSlope),
    /// Select auto or normal triggering
    SetTriggerMode(TriggerMode),
    /// Switch between real-time and equivalent-time sampling
    SetSamplingMode(SamplingMode),
    /// Step the sampling rate: +1 faster, -1 slower
    StepPrescale(i8),
    /// Change the zoom power by the given step (±1)
    SetZoomPower(i8),
    /// Select the interpolation used when zoomed
    SetInterpolation(Interpolation),
    /// Toggle between running and frozen
    ToggleRun,
    /// Freeze automatically after the next complete acquisition
    ArmSingleSweep,
    /// Write the last raw acquisition to the dump file
    DumpRawBuffer,
    /// Leave the application
    Quit,
}

impl Command {
    /// Whether this command changes the instrument configuration
    pub fn is_retune(&self) -> bool {
        matches!(
            self,
            Command::SetChannelCount(_)
                | Command::SetSlope(_)
                | Command::SetTriggerMode(_)
                | Command::SetSamplingMode(_)
                | Command::StepPrescale(_)
        )
    }

    /// Apply a retune command to `current`, returning the config to request
    ///
    /// `None` means there is nothing to send: the command is not a retune,
    /// the prescale is already at the bound of its mode, or auto triggering
    /// was asked for in equivalent-time sampling. A config equal to `current`
    /// is still returned so it can be sent again.
    pub fn retune(&self, current: AcquisitionConfig) -> Option<AcquisitionConfig> {
        let mut next = current;
        match *self {
            Command::SetChannelCount(n) => {
                next.channel_count = n.clamp(1, MAX_CHANNELS);
            }
            Command::SetSlope(slope) => {
                next.trigger_slope = slope;
                next.trigger_mode = TriggerMode::Normal;
            }
            Command::SetTriggerMode(TriggerMode::Auto) => {
                // Auto triggering exists only in real-time sampling
                if current.sampling_mode != SamplingMode::RealTime {
                    return None;
                }
                next.trigger_mode = TriggerMode::Auto;
            }
            Command::SetTriggerMode(TriggerMode::Normal) => {
                next.trigger_mode = TriggerMode::Normal;
            }
            Command::SetSamplingMode(mode) => {
                next.sampling_mode = mode;
                next.prescale = mode.fastest_prescale();
                if mode == SamplingMode::EquivalentTime {
                    next.trigger_mode = TriggerMode::Normal;
                }
            }
            Command::StepPrescale(step) => {
                // A larger prescale means a slower clock
                let range = current.sampling_mode.prescale_range();
                let stepped = i16::from(current.prescale) - i16::from(step);
                if stepped < i16::from(*range.start()) || stepped > i16::from(*range.end()) {
                    return None;
                }
                next.prescale = stepped as u8;
            }
            _ => return None,
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt() -> AcquisitionConfig {
        AcquisitionConfig::default()
    }

    fn et() -> AcquisitionConfig {
        AcquisitionConfig {
            sampling_mode: SamplingMode::EquivalentTime,
            prescale: 1,
            ..AcquisitionConfig::default()
        }
    }

    #[test]
    fn test_channel_count_is_clamped() {
        let count = |n| Command::SetChannelCount(n).retune(rt()).unwrap().channel_count;
        assert_eq!(count(0), 1);
        assert_eq!(count(9), MAX_CHANNELS);
        assert_eq!(count(2), 2);
    }

    #[test]
    fn test_unchanged_channel_count_is_still_requested() {
        assert_eq!(Command::SetChannelCount(1).retune(rt()), Some(rt()));
    }

    #[test]
    fn test_slope_forces_normal_trigger() {
        let mut current = rt();
        current.trigger_mode = TriggerMode::Auto;
        let next = Command::SetSlope(TriggerSlope::Falling).retune(current).unwrap();
        assert_eq!(next.trigger_slope, TriggerSlope::Falling);
        assert_eq!(next.trigger_mode, TriggerMode::Normal);
    }

    #[test]
    fn test_auto_trigger_only_in_real_time() {
        let next = Command::SetTriggerMode(TriggerMode::Auto).retune(rt()).unwrap();
        assert_eq!(next.trigger_mode, TriggerMode::Auto);

        assert_eq!(Command::SetTriggerMode(TriggerMode::Auto).retune(et()), None);
    }

    #[test]
    fn test_sampling_mode_switch_selects_fastest_rate() {
        let to_et = Command::SetSamplingMode(SamplingMode::EquivalentTime)
            .retune(AcquisitionConfig {
                trigger_mode: TriggerMode::Auto,
                prescale: 6,
                ..rt()
            })
            .unwrap();
        assert_eq!(to_et.sampling_mode, SamplingMode::EquivalentTime);
        assert_eq!(to_et.prescale, 1);
        assert_eq!(to_et.trigger_mode, TriggerMode::Normal);
        assert!(to_et.validate().is_ok());

        let to_rt = Command::SetSamplingMode(SamplingMode::RealTime).retune(et()).unwrap();
        assert_eq!(to_rt.prescale, 2);
        assert!(to_rt.validate().is_ok());

        // Reselecting the current mode returns to its fastest rate
        let slow = AcquisitionConfig { prescale: 6, ..rt() };
        let again = Command::SetSamplingMode(SamplingMode::RealTime).retune(slow);
        assert_eq!(again, Some(rt()));
    }

    #[test]
    fn test_prescale_steps_stop_at_mode_bounds() {
        let current = rt();
        assert_eq!(Command::StepPrescale(1).retune(current), None);
        assert_eq!(Command::StepPrescale(-1).retune(current).unwrap().prescale, 3);

        let slowest = AcquisitionConfig { prescale: 5, ..et() };
        assert_eq!(Command::StepPrescale(-1).retune(slowest), None);
        assert_eq!(Command::StepPrescale(1).retune(slowest).unwrap().prescale, 4);
    }

    #[test]
    fn test_non_retune_commands() {
        for cmd in [
            Command::SetZoomPower(1),
            Command::ToggleRun,
            Command::ArmSingleSweep,
            Command::DumpRawBuffer,
            Command::Quit,
        ] {
            assert!(!cmd.is_retune());
            assert_eq!(cmd.retune(rt()), None);
        }
        assert!(Command::StepPrescale(1).is_retune());
    }
}
