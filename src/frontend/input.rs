//! Keyboard map
//!
//! Printable keys arrive as text events so that `/`, `\` and `+` work on any
//! layout; the arrows arrive as key events.

use crate::acquisition::Command;
use crate::renderer::DisplaySnapshot;
use crate::types::{SamplingMode, TriggerMode, TriggerSlope};
use egui::Key;

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    ToggleSamplingMode,
    ChannelCount(u8),
    Faster,
    Slower,
    AutoTrigger,
    Slope(TriggerSlope),
    ZoomIn,
    ZoomOut,
    ToggleInterpolation,
    ToggleXy,
    ToggleRun,
    SingleSweep,
    Dump,
}

/// Map a typed character
pub fn action_for_text(text: &str) -> Option<KeyAction> {
    let mut chars = text.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(match c {
        'q' => KeyAction::Quit,
        'm' => KeyAction::ToggleSamplingMode,
        '1' => KeyAction::ChannelCount(1),
        '2' => KeyAction::ChannelCount(2),
        '+' => KeyAction::Faster,
        '-' => KeyAction::Slower,
        'a' => KeyAction::AutoTrigger,
        '/' => KeyAction::Slope(TriggerSlope::Rising),
        '\\' => KeyAction::Slope(TriggerSlope::Falling),
        'i' => KeyAction::ToggleInterpolation,
        'x' => KeyAction::ToggleXy,
        ' ' => KeyAction::ToggleRun,
        's' => KeyAction::SingleSweep,
        'd' => KeyAction::Dump,
        _ => return None,
    })
}

/// Map a non-text key
pub fn action_for_key(key: Key) -> Option<KeyAction> {
    match key {
        Key::ArrowRight => Some(KeyAction::ZoomIn),
        Key::ArrowLeft => Some(KeyAction::ZoomOut),
        _ => None,
    }
}

impl KeyAction {
    /// The command to send for this action given the latest display state
    ///
    /// Returns `None` for actions handled by the window itself and for
    /// toggles that do not apply to the current state.
    pub fn command(&self, snapshot: Option<&DisplaySnapshot>) -> Option<Command> {
        let command = match *self {
            KeyAction::Quit => Command::Quit,
            KeyAction::ToggleSamplingMode => {
                let current = snapshot?.config.sampling_mode;
                Command::SetSamplingMode(match current {
                    SamplingMode::RealTime => SamplingMode::EquivalentTime,
                    SamplingMode::EquivalentTime => SamplingMode::RealTime,
                })
            }
            KeyAction::ChannelCount(n) => Command::SetChannelCount(n),
            KeyAction::Faster => Command::StepPrescale(1),
            KeyAction::Slower => Command::StepPrescale(-1),
            KeyAction::AutoTrigger => Command::SetTriggerMode(TriggerMode::Auto),
            KeyAction::Slope(slope) => Command::SetSlope(slope),
            KeyAction::ZoomIn => Command::SetZoomPower(1),
            KeyAction::ZoomOut => Command::SetZoomPower(-1),
            KeyAction::ToggleInterpolation => {
                let zoom = snapshot?.zoom;
                // Interpolation only matters while magnified
                if zoom.power() == 0 {
                    return None;
                }
                Command::SetInterpolation(zoom.interpolation.toggled())
            }
            KeyAction::ToggleRun => Command::ToggleRun,
            KeyAction::SingleSweep => Command::ArmSingleSweep,
            KeyAction::Dump => Command::DumpRawBuffer,
            KeyAction::ToggleXy => return None,
        };
        Some(command)
    }
}
