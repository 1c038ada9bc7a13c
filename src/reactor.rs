//! Reactor
//!
//! The single thread of control for the core. Each turn waits on the
//! operator command channel and, unless acquisition is frozen, the link's
//! chunk channel. Whatever became ready is processed to completion (frames
//! decoded, state updated, resampled, handed to the renderer) before the next
//! wait. If nothing arrives within the wait timeout the state machine is told
//! so and may mark the trace stale.
//!
//! # Example
//!
//! ```ignore
//! let link = Box::new(SimulatedDevice::start(SimSettings::default())?);
//! let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
//! let mut reactor = Reactor::new(
//!     link,
//!     Box::new(LogRenderer::new()),
//!     commands_rx,
//!     Resampler::with_default_kernels(),
//!     AcquisitionState::default(),
//!     ReactorSettings::default(),
//! );
//! reactor.run()?;
//! ```

use crate::acquisition::{AcquisitionState, Command, Effect, Event};
use crate::analysis::Resampler;
use crate::error::{Result, ResultExt};
use crate::export::{write_dump, DumpFormat};
use crate::link::{ChunkReader, Link, LinkStats};
use crate::protocol::{DecoderStats, FrameDecoder};
use crate::renderer::Renderer;
use crossbeam_channel::{Receiver, Select, TryRecvError};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Frames decoded per turn before commands get another look
const MAX_FRAMES_PER_TURN: usize = 32;

/// Reactor timing and export settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReactorSettings {
    /// How long to wait for any source before reporting a wait timeout
    pub wait_timeout: Duration,
    /// Time allowed for a started frame to complete; `None` waits forever
    pub frame_deadline: Option<Duration>,
    /// Where raw buffer dumps are written
    pub dump_path: PathBuf,
    /// Dump file format
    pub dump_format: DumpFormat,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(5000),
            frame_deadline: Some(Duration::from_millis(2000)),
            dump_path: PathBuf::from("out.dump"),
            dump_format: DumpFormat::Text,
        }
    }
}

/// Drives the acquisition state machine from link and operator input
pub struct Reactor {
    state: AcquisitionState,
    resampler: Resampler,
    link: Box<dyn Link>,
    reader: ChunkReader,
    decoder: FrameDecoder,
    commands: Receiver<Command>,
    renderer: Box<dyn Renderer>,
    settings: ReactorSettings,
    link_active: bool,
}

impl Reactor {
    pub fn new(
        link: Box<dyn Link>,
        renderer: Box<dyn Renderer>,
        commands: Receiver<Command>,
        resampler: Resampler,
        state: AcquisitionState,
        settings: ReactorSettings,
    ) -> Self {
        let reader = link.reader();
        let link_active = state.is_running();
        Self {
            state,
            resampler,
            link,
            reader,
            decoder: FrameDecoder::new(),
            commands,
            renderer,
            settings,
            link_active,
        }
    }

    /// Current acquisition state
    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    /// Whether the link is part of the wait set
    pub fn is_link_active(&self) -> bool {
        self.link_active
    }

    pub fn decoder_stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.stats()
    }

    /// Run until the operator quits or the link fails
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Reactor started on {}", self.link.describe());
        let result = loop {
            match self.turn() {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break Ok(()),
                Err(e) => {
                    tracing::error!("{}", e);
                    break Err(e);
                }
            }
        };
        tracing::info!(
            "Reactor stopped: {:?}, {:?}",
            self.decoder.stats(),
            self.link.stats()
        );
        result
    }

    /// Wait for one source and process everything it made available
    pub fn turn(&mut self) -> Result<ControlFlow<()>> {
        let commands = self.commands.clone();
        let chunks = self.link.chunks().clone();

        let buffered = self.link_active && self.reader.has_pending();
        let mut select = Select::new();
        let command_index = select.recv(&commands);
        if self.link_active {
            select.recv(&chunks);
        }

        let timeout = if buffered {
            Duration::ZERO
        } else {
            self.settings.wait_timeout
        };

        match select.ready_timeout(timeout) {
            Ok(index) if index == command_index => match commands.try_recv() {
                Ok(command) => self.dispatch(Event::Command(command)),
                Err(TryRecvError::Empty) => Ok(ControlFlow::Continue(())),
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Command channel closed, quitting");
                    Ok(ControlFlow::Break(()))
                }
            },
            Ok(_) => self.ingest(),
            Err(_) if buffered => self.ingest(),
            Err(_) => self.dispatch(Event::WaitTimeout),
        }
    }

    /// Decode and apply every frame the link has buffered
    fn ingest(&mut self) -> Result<ControlFlow<()>> {
        let mut frames = 0;
        while self.link_active && frames < MAX_FRAMES_PER_TURN && self.reader.has_pending() {
            let deadline = self.settings.frame_deadline.map(|d| Instant::now() + d);
            self.reader.set_deadline(deadline);

            match self.decoder.read_frame(&mut self.reader) {
                Ok(Some(frame)) => {
                    frames += 1;
                    if self.dispatch(Event::FrameDecoded(frame))?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
                Ok(None) => {}
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Dropped incomplete frame: {}", e);
                }
                Err(e) => {
                    let link = self.link.describe();
                    return Err(e).with_context(|| format!("Link {} failed", link));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn dispatch(&mut self, event: Event) -> Result<ControlFlow<()>> {
        let state = std::mem::take(&mut self.state);
        let transition = state.apply(event, &self.resampler);
        self.state = transition.state;

        for effect in transition.effects {
            if self.execute(effect)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn execute(&mut self, effect: Effect) -> Result<ControlFlow<()>> {
        match effect {
            Effect::SendControlWord(word) => {
                self.link
                    .write_control_word(word)
                    .context("Failed to retune instrument")?;
            }
            Effect::PauseLink => {
                self.link_active = false;
            }
            Effect::ResumeLink => {
                self.link.discard_input()?;
                self.reader.clear();
                self.link_active = true;
            }
            Effect::Render(snapshot) => self.renderer.render(&snapshot),
            Effect::DumpRaw(snapshot) => {
                if let Err(e) =
                    write_dump(&self.settings.dump_path, &snapshot, self.settings.dump_format)
                {
                    tracing::warn!("Raw dump failed: {}", e);
                }
            }
            Effect::Quit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }
}
