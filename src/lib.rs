//! # ascope-rs: Microcontroller Oscilloscope Viewer
//!
//! Host-side controller and viewer for a small oscilloscope built on a
//! microcontroller. The instrument streams framed acquisitions over a serial
//! link; this crate synchronizes to the stream, decodes frames, reconstructs
//! and magnifies the waveform, and sends single-byte control words back to
//! retune the instrument.
//!
//! ## Architecture
//!
//! - **Link**: A serial port (or simulated instrument) pumped into a crossbeam channel
//! - **Protocol**: Control word packing and the frame decoder
//! - **Analysis**: Sinc kernel tables and the resampling engine
//! - **Acquisition**: The state machine that turns frames and commands into effects
//! - **Reactor**: The single thread of control that waits on link and commands
//! - **Frontend**: eframe/egui window fed by display snapshots
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `dev.ascope.ascope-rs`, or from the file given with `--config`.
//!
//! ## Example
//!
//! ```ignore
//! use ascope_rs::{
//!     acquisition::AcquisitionState,
//!     analysis::Resampler,
//!     link::{SimSettings, SimulatedDevice},
//!     reactor::{Reactor, ReactorSettings},
//!     renderer::LogRenderer,
//! };
//!
//! fn main() -> ascope_rs::Result<()> {
//!     let link = SimulatedDevice::start(SimSettings::default())?;
//!     let (_commands_tx, commands_rx) = crossbeam_channel::unbounded();
//!     let mut reactor = Reactor::new(
//!         Box::new(link),
//!         Box::new(LogRenderer::new()),
//!         commands_rx,
//!         Resampler::with_default_kernels(),
//!         AcquisitionState::default(),
//!         ReactorSettings::default(),
//!     );
//!     reactor.run()
//! }
//! ```

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod frontend;
pub mod link;
pub mod protocol;
pub mod reactor;
pub mod renderer;
pub mod types;

// Re-export commonly used types
pub use acquisition::{AcquisitionState, Command, Effect, Event};
pub use analysis::{Resampler, SincKernelTable};
pub use config::AppConfig;
pub use error::{Result, ScopeError};
pub use reactor::{Reactor, ReactorSettings};
pub use renderer::{DisplaySnapshot, Renderer};
pub use types::{AcquisitionConfig, Frame, RawBuffer, VoltageBuffer, ZoomState};
