//! Acquisition state machine
//!
//! [`AcquisitionState`] is an owned value threaded through
//! [`AcquisitionState::apply`]. Each event yields the next state together
//! with the effects the reactor must carry out; the state itself never
//! touches the link, the renderer or the file system.

use super::command::Command;
use crate::analysis::Resampler;
use crate::export::RawSnapshot;
use crate::protocol::encode;
use crate::renderer::{DisplaySnapshot, TraceStatus};
use crate::types::{
    AcquisitionConfig, Frame, RawBuffer, VoltageBuffer, VoltageRange, ZoomState,
};
use chrono::{DateTime, Local};

/// Whether the host and the instrument agree on the current config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// A control word was sent and no frame has confirmed it yet
    #[default]
    Unsynchronized,
    /// A frame was decoded since the last retune
    Synchronized {
        /// Whether the latest frame carried a complete acquisition
        ready: bool,
    },
}

impl SyncState {
    /// Whether a frame has been seen since the last retune
    pub fn is_synchronized(&self) -> bool {
        matches!(self, SyncState::Synchronized { .. })
    }

    /// Whether the latest frame carried samples
    pub fn is_ready(&self) -> bool {
        matches!(self, SyncState::Synchronized { ready: true })
    }
}

/// Run mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFlags {
    /// False while frozen
    pub running: bool,
    /// Freeze after the next ready frame
    pub single_sweep_armed: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            running: true,
            single_sweep_armed: false,
        }
    }
}

/// The last complete acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Config reported with the samples
    pub config: AcquisitionConfig,
    /// Raw ADC samples
    pub raw: RawBuffer,
    /// Samples converted to volts
    pub voltages: VoltageBuffer,
    /// When the frame was decoded
    pub captured_at: DateTime<Local>,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A frame arrived from the instrument
    FrameDecoded(Frame),
    /// The operator issued a command
    Command(Command),
    /// Nothing arrived within the wait timeout
    WaitTimeout,
}

/// Side effects requested by a transition, executed in order by the reactor
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write one control word to the instrument
    SendControlWord(u8),
    /// Stop listening to the instrument
    PauseLink,
    /// Listen again, discarding input received meanwhile
    ResumeLink,
    /// Present a snapshot
    Render(DisplaySnapshot),
    /// Export the last raw acquisition
    DumpRaw(RawSnapshot),
    /// Leave the application
    Quit,
}

/// Result of applying one event
#[derive(Debug)]
pub struct Transition {
    /// The next state
    pub state: AcquisitionState,
    /// Effects to carry out, in order
    pub effects: Vec<Effect>,
}

/// Everything the core knows about the acquisition in progress
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionState {
    sync: SyncState,
    run: RunFlags,
    config: AcquisitionConfig,
    zoom: ZoomState,
    voltage_range: VoltageRange,
    capture: Option<Capture>,
    display: Option<VoltageBuffer>,
    /// The displayed trace came from a ready frame and has not gone stale
    trace_fresh: bool,
}

impl Default for AcquisitionState {
    fn default() -> Self {
        Self::new(ZoomState::default(), VoltageRange::default())
    }
}

impl AcquisitionState {
    /// Initial state: unsynchronized, running, nothing captured
    pub fn new(zoom: ZoomState, voltage_range: VoltageRange) -> Self {
        Self {
            sync: SyncState::Unsynchronized,
            run: RunFlags::default(),
            config: AcquisitionConfig::default(),
            zoom,
            voltage_range,
            capture: None,
            display: None,
            trace_fresh: false,
        }
    }

    pub fn sync(&self) -> SyncState {
        self.sync
    }

    pub fn run_flags(&self) -> RunFlags {
        self.run
    }

    /// Whether acquisition is running (not frozen)
    pub fn is_running(&self) -> bool {
        self.run.running
    }

    /// Last config reported by, or requested from, the instrument
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn voltage_range(&self) -> &VoltageRange {
        &self.voltage_range
    }

    /// The last complete acquisition, if any
    pub fn capture(&self) -> Option<&Capture> {
        self.capture.as_ref()
    }

    /// The resampled trace of the last acquisition
    pub fn display(&self) -> Option<&VoltageBuffer> {
        self.display.as_ref()
    }

    /// Whether the resampled trace is still current
    ///
    /// Survives not-ready frames; cleared by the wait timeout and by a retune.
    pub fn is_trace_fresh(&self) -> bool {
        self.trace_fresh && self.display.is_some()
    }

    /// Snapshot of what a renderer should show right now
    pub fn snapshot(&self) -> DisplaySnapshot {
        let fresh = self.is_trace_fresh();
        DisplaySnapshot {
            trace: if fresh { self.display.clone() } else { None },
            status: if fresh {
                TraceStatus::Fresh
            } else {
                TraceStatus::Stale
            },
            zoom: self.zoom,
            config: self.config,
            voltage_range: self.voltage_range,
            running: self.run.running,
            single_sweep_armed: self.run.single_sweep_armed,
            taken_at: Local::now(),
        }
    }

    /// Apply one event, returning the next state and the effects to run
    pub fn apply(mut self, event: Event, resampler: &Resampler) -> Transition {
        let effects = match event {
            Event::FrameDecoded(frame) => self.on_frame(frame, resampler),
            Event::Command(command) => self.on_command(command, resampler),
            Event::WaitTimeout => self.on_wait_timeout(),
        };
        Transition {
            state: self,
            effects,
        }
    }

    fn on_frame(&mut self, frame: Frame, resampler: &Resampler) -> Vec<Effect> {
        if !self.run.running {
            return Vec::new();
        }

        self.config = frame.config;
        let raw = match frame.samples {
            Some(raw) if frame.ready => raw,
            _ => {
                self.sync = SyncState::Synchronized { ready: false };
                return Vec::new();
            }
        };

        let voltages = raw.to_voltages(&self.voltage_range);
        self.display = Some(resampler.resample(&voltages, &self.zoom));
        self.capture = Some(Capture {
            config: frame.config,
            raw,
            voltages,
            captured_at: Local::now(),
        });
        self.sync = SyncState::Synchronized { ready: true };
        self.trace_fresh = true;

        let mut effects = Vec::with_capacity(2);
        if self.run.single_sweep_armed {
            self.run.running = false;
            self.run.single_sweep_armed = false;
            tracing::info!("Single sweep complete, acquisition frozen");
        }
        effects.push(Effect::Render(self.snapshot()));
        if !self.run.running {
            effects.push(Effect::PauseLink);
        }
        effects
    }

    fn on_command(&mut self, command: Command, resampler: &Resampler) -> Vec<Effect> {
        if command.is_retune() {
            return self.retune(command);
        }

        match command {
            Command::SetZoomPower(step) => {
                self.zoom.step(step);
                self.refresh_display(resampler)
            }
            Command::SetInterpolation(interpolation) => {
                self.zoom.interpolation = interpolation;
                self.refresh_display(resampler)
            }
            Command::ToggleRun => {
                self.run.running = !self.run.running;
                let link = if self.run.running {
                    tracing::info!("Acquisition resumed");
                    Effect::ResumeLink
                } else {
                    tracing::info!("Acquisition frozen");
                    Effect::PauseLink
                };
                vec![link, Effect::Render(self.snapshot())]
            }
            Command::ArmSingleSweep => {
                self.run.single_sweep_armed = true;
                vec![Effect::Render(self.snapshot())]
            }
            Command::DumpRawBuffer => match (&self.capture, self.trace_fresh) {
                (Some(capture), true) => vec![Effect::DumpRaw(RawSnapshot {
                    config: capture.config,
                    raw: capture.raw.clone(),
                    captured_at: capture.captured_at,
                })],
                _ => {
                    tracing::debug!("No complete acquisition to dump");
                    Vec::new()
                }
            },
            Command::Quit => vec![Effect::Quit],
            _ => Vec::new(),
        }
    }

    fn retune(&mut self, command: Command) -> Vec<Effect> {
        if !self.sync.is_synchronized() || !self.run.running {
            tracing::debug!("Ignoring {:?}: not synchronized and running", command);
            return Vec::new();
        }

        let Some(next) = command.retune(self.config) else {
            tracing::debug!("Ignoring {:?}: nothing to request", command);
            return Vec::new();
        };
        if let Err(e) = next.validate() {
            tracing::debug!("Rejecting {:?}: {}", command, e);
            return Vec::new();
        }

        let word = encode(&next);
        tracing::debug!("Retune {:?} -> control word {:#04x}", command, word);
        self.config = next;
        self.sync = SyncState::Unsynchronized;
        self.trace_fresh = false;
        vec![Effect::SendControlWord(word)]
    }

    fn on_wait_timeout(&mut self) -> Vec<Effect> {
        if !self.run.running || !self.sync.is_synchronized() {
            return Vec::new();
        }
        self.sync = SyncState::Synchronized { ready: false };
        if std::mem::take(&mut self.trace_fresh) {
            tracing::debug!("No frame within the wait timeout, trace is stale");
            vec![Effect::Render(self.snapshot())]
        } else {
            Vec::new()
        }
    }

    /// Re-run the resampler on the unchanged last capture
    fn refresh_display(&mut self, resampler: &Resampler) -> Vec<Effect> {
        match &self.capture {
            Some(capture) if self.trace_fresh => {
                self.display = Some(resampler.resample(&capture.voltages, &self.zoom));
                vec![Effect::Render(self.snapshot())]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SincKernelTable;
    use crate::protocol::decode;
    use crate::types::{
        Interpolation, SamplingMode, TriggerMode, TriggerSlope, SAMPLES_PER_CHANNEL,
    };
    use std::sync::Arc;

    fn resampler() -> Resampler {
        Resampler::new(Arc::new(SincKernelTable::build(2)))
    }

    fn ready_frame(word: u8, fill: u8) -> Frame {
        let config = decode(word);
        let channels = vec![vec![fill; SAMPLES_PER_CHANNEL]; usize::from(config.channel_count)];
        Frame {
            config,
            ready: true,
            samples: Some(RawBuffer::from_channels(channels).unwrap()),
        }
    }

    fn idle_frame(word: u8) -> Frame {
        Frame {
            config: decode(word),
            ready: false,
            samples: None,
        }
    }

    fn run(state: AcquisitionState, events: Vec<Event>) -> (AcquisitionState, Vec<Effect>) {
        let resampler = resampler();
        let mut effects = Vec::new();
        let mut state = state;
        for event in events {
            let t = state.apply(event, &resampler);
            state = t.state;
            effects.extend(t.effects);
        }
        (state, effects)
    }

    fn renders(effects: &[Effect]) -> Vec<&DisplaySnapshot> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Render(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Default RT/normal/rising config at prescale 2, one channel
    const RT_WORD: u8 = 0x4a;

    fn synced_ready() -> AcquisitionState {
        run(
            AcquisitionState::default(),
            vec![Event::FrameDecoded(ready_frame(RT_WORD, 128))],
        )
        .0
    }

    #[test]
    fn test_not_ready_frame_synchronizes_without_render() {
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![Event::FrameDecoded(idle_frame(0x81))],
        );
        assert_eq!(state.sync(), SyncState::Synchronized { ready: false });
        assert_eq!(state.config().sampling_mode, SamplingMode::EquivalentTime);
        assert!(state.capture().is_none());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ready_frame_renders_fresh_trace() {
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![Event::FrameDecoded(ready_frame(0x81, 255))],
        );

        assert_eq!(state.sync(), SyncState::Synchronized { ready: true });
        let config = state.config();
        assert_eq!(config.sampling_mode, SamplingMode::EquivalentTime);
        assert_eq!(config.trigger_mode, TriggerMode::Auto);
        assert_eq!(config.channel_count, 1);
        assert_eq!(config.trigger_slope, TriggerSlope::Falling);
        assert_eq!(config.prescale, 1);

        let snapshots = renders(&effects);
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].is_fresh());
        let trace = snapshots[0].trace.as_ref().unwrap();
        assert_eq!(trace.channel_count(), 1);
        assert!(trace.channel(0).unwrap().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_ready_flag_without_samples_is_not_ready() {
        let mut frame = ready_frame(RT_WORD, 0);
        frame.samples = None;
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![Event::FrameDecoded(frame)],
        );
        assert_eq!(state.sync(), SyncState::Synchronized { ready: false });
        assert!(effects.is_empty());
    }

    #[test]
    fn test_retune_when_ready_desynchronizes() {
        let (state, effects) = run(
            synced_ready(),
            vec![Event::Command(Command::SetChannelCount(2))],
        );
        assert_eq!(state.sync(), SyncState::Unsynchronized);
        assert_eq!(state.config().channel_count, 2);

        let expected = encode(&AcquisitionConfig {
            channel_count: 2,
            ..AcquisitionConfig::default()
        });
        assert_eq!(effects, vec![Effect::SendControlWord(expected)]);
    }

    #[test]
    fn test_retune_rejected_while_unsynchronized() {
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![Event::Command(Command::SetChannelCount(2))],
        );
        assert_eq!(state.sync(), SyncState::Unsynchronized);
        assert_eq!(state.config().channel_count, 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_retune_rejected_while_frozen() {
        let (state, effects) = run(
            synced_ready(),
            vec![
                Event::Command(Command::ToggleRun),
                Event::Command(Command::StepPrescale(-1)),
            ],
        );
        assert_eq!(state.config().prescale, 2);
        assert!(!effects.iter().any(|e| matches!(e, Effect::SendControlWord(_))));
    }

    #[test]
    fn test_unchanged_retune_is_still_sent() {
        let (state, effects) = run(
            synced_ready(),
            vec![Event::Command(Command::SetChannelCount(1))],
        );
        assert_eq!(effects, vec![Effect::SendControlWord(RT_WORD)]);
        assert_eq!(state.sync(), SyncState::Unsynchronized);
        assert!(!state.snapshot().is_fresh());
    }

    #[test]
    fn test_prescale_step_at_bound_sends_nothing() {
        // Already at the fastest real-time rate
        let (state, effects) = run(
            synced_ready(),
            vec![Event::Command(Command::StepPrescale(1))],
        );
        assert!(effects.is_empty());
        assert_eq!(state.sync(), SyncState::Synchronized { ready: true });
    }

    #[test]
    fn test_auto_trigger_in_equivalent_time_sends_nothing() {
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![
                Event::FrameDecoded(ready_frame(0xc1, 128)),
                Event::Command(Command::SetTriggerMode(TriggerMode::Auto)),
            ],
        );
        assert_eq!(renders(&effects).len(), 1);
        assert!(!effects.iter().any(|e| matches!(e, Effect::SendControlWord(_))));
        assert_eq!(state.config().trigger_mode, TriggerMode::Normal);
        assert!(state.sync().is_ready());
    }

    #[test]
    fn test_retune_from_invalid_reported_config_is_rejected() {
        // Device reports three channels, which the host never requests
        let mut frame = idle_frame(0x6a);
        frame.config.channel_count = 3;
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![
                Event::FrameDecoded(frame),
                Event::Command(Command::SetSlope(TriggerSlope::Falling)),
            ],
        );
        assert!(effects.is_empty());
        assert!(state.sync().is_synchronized());
    }

    #[test]
    fn test_single_sweep_freezes_after_one_ready_frame() {
        let (state, effects) = run(
            synced_ready(),
            vec![
                Event::Command(Command::ArmSingleSweep),
                Event::FrameDecoded(ready_frame(RT_WORD, 10)),
                Event::FrameDecoded(ready_frame(RT_WORD, 200)),
            ],
        );

        let flags = state.run_flags();
        assert!(!flags.running);
        assert!(!flags.single_sweep_armed);

        // The second frame was ignored while frozen
        let raw = &state.capture().unwrap().raw;
        assert!(raw.channel(0).unwrap().iter().all(|&s| s == 10));

        let last_two: Vec<&Effect> = effects.iter().rev().take(2).collect();
        assert_eq!(last_two[0], &Effect::PauseLink);
        match last_two[1] {
            Effect::Render(snapshot) => {
                assert!(snapshot.is_fresh());
                assert!(!snapshot.running);
            }
            other => panic!("expected render, got {other:?}"),
        }
    }

    #[test]
    fn test_not_ready_frame_keeps_single_sweep_armed() {
        let (state, _) = run(
            synced_ready(),
            vec![
                Event::Command(Command::ArmSingleSweep),
                Event::FrameDecoded(idle_frame(RT_WORD)),
            ],
        );
        assert!(state.is_running());
        assert!(state.run_flags().single_sweep_armed);
    }

    #[test]
    fn test_wait_timeout_after_ready_goes_stale() {
        let before = synced_ready();
        let config = *before.config();
        let (state, effects) = run(before, vec![Event::WaitTimeout]);

        assert_eq!(state.sync(), SyncState::Synchronized { ready: false });
        assert_eq!(*state.config(), config);
        let snapshots = renders(&effects);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].status, TraceStatus::Stale);
        assert!(snapshots[0].trace.is_none());
    }

    #[test]
    fn test_wait_timeout_after_idle_frame_goes_stale() {
        let (state, effects) = run(
            synced_ready(),
            vec![Event::FrameDecoded(idle_frame(RT_WORD)), Event::WaitTimeout],
        );
        assert!(!state.is_trace_fresh());
        let snapshots = renders(&effects);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].status, TraceStatus::Stale);
        assert!(snapshots[0].trace.is_none());

        // Already stale: a second timeout draws nothing
        let (_, effects) = run(state, vec![Event::WaitTimeout]);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_idle_frame_keeps_trace_on_screen() {
        let (state, effects) = run(
            synced_ready(),
            vec![
                Event::FrameDecoded(idle_frame(RT_WORD)),
                Event::Command(Command::ToggleRun),
                Event::Command(Command::ArmSingleSweep),
            ],
        );
        assert_eq!(state.sync(), SyncState::Synchronized { ready: false });
        let expected = VoltageRange::default().to_voltage(128);
        let snapshots = renders(&effects);
        assert_eq!(snapshots.len(), 2);
        for snapshot in snapshots {
            assert!(snapshot.is_fresh());
            let trace = snapshot.trace.as_ref().unwrap();
            assert!(trace.channel(0).unwrap().iter().all(|&v| v == expected));
        }

        // The trace on screen can still be zoomed and dumped
        let (_, effects) = run(
            state,
            vec![
                Event::Command(Command::SetZoomPower(1)),
                Event::Command(Command::DumpRawBuffer),
            ],
        );
        assert!(matches!(effects.as_slice(), [Effect::Render(s), Effect::DumpRaw(_)] if s.is_fresh()));
    }

    #[test]
    fn test_wait_timeout_ignored_when_frozen_or_unsynchronized() {
        let (state, effects) = run(AcquisitionState::default(), vec![Event::WaitTimeout]);
        assert_eq!(state.sync(), SyncState::Unsynchronized);
        assert!(effects.is_empty());

        let (state, effects) = run(
            synced_ready(),
            vec![Event::Command(Command::ToggleRun), Event::WaitTimeout],
        );
        assert!(state.sync().is_ready());
        assert_eq!(renders(&effects).len(), 1);
    }

    #[test]
    fn test_toggle_run_pauses_and_resumes_link() {
        let resampler = resampler();
        let t = synced_ready().apply(Event::Command(Command::ToggleRun), &resampler);
        assert_eq!(t.effects[0], Effect::PauseLink);
        assert!(!t.state.is_running());

        let t = t.state.apply(Event::Command(Command::ToggleRun), &resampler);
        assert_eq!(t.effects[0], Effect::ResumeLink);
        assert!(t.state.is_running());
    }

    #[test]
    fn test_zoom_recomputes_from_last_capture() {
        let ramp: Vec<u8> = (0..SAMPLES_PER_CHANNEL).map(|i| i as u8).collect();
        let frame = Frame {
            config: decode(RT_WORD),
            ready: true,
            samples: Some(RawBuffer::from_channels(vec![ramp]).unwrap()),
        };
        let (state, _) = run(AcquisitionState::default(), vec![Event::FrameDecoded(frame)]);
        let (state, effects) = run(
            state,
            vec![
                Event::Command(Command::SetInterpolation(Interpolation::Linear)),
                Event::Command(Command::SetZoomPower(1)),
            ],
        );

        assert_eq!(state.zoom().power(), 1);
        let snapshots = renders(&effects);
        assert_eq!(snapshots.len(), 2);
        let trace = snapshots[1].trace.as_ref().unwrap().channel(0).unwrap();
        let range = VoltageRange::default();
        assert_eq!(trace[2], range.to_voltage(1));
        let midpoint = (range.to_voltage(0) + range.to_voltage(1)) / 2.0;
        assert!((trace[1] - midpoint).abs() < 1e-12);
    }

    #[test]
    fn test_zoom_without_capture_only_updates_zoom() {
        let (state, effects) = run(
            AcquisitionState::default(),
            vec![Event::Command(Command::SetZoomPower(1))],
        );
        assert_eq!(state.zoom().power(), 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_dump_needs_ready_capture() {
        let (_, effects) = run(
            AcquisitionState::default(),
            vec![Event::Command(Command::DumpRawBuffer)],
        );
        assert!(effects.is_empty());

        let (_, effects) = run(synced_ready(), vec![Event::Command(Command::DumpRawBuffer)]);
        match effects.as_slice() {
            [Effect::DumpRaw(snapshot)] => {
                assert_eq!(snapshot.raw.channel_count(), 1);
                assert_eq!(snapshot.config, decode(RT_WORD));
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn test_quit() {
        let (_, effects) = run(synced_ready(), vec![Event::Command(Command::Quit)]);
        assert_eq!(effects, vec![Effect::Quit]);
    }
}
