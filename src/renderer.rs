//! Renderer seam
//!
//! The core hands a [`DisplaySnapshot`] to a [`Renderer`] whenever the trace
//! becomes fresh or stale, or the run mode changes. Renderers never mutate
//! acquisition state and never answer back.

use crate::types::{AcquisitionConfig, VoltageBuffer, VoltageRange, ZoomState};
use chrono::{DateTime, Local};
use crossbeam_channel::{Sender, TrySendError};

/// Freshness of the trace handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    /// Resampled from the latest ready frame
    Fresh,
    /// No ready frame arrived recently; the trace is absent or outdated
    Stale,
}

/// Read-only view of everything a renderer may draw
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    /// Resampled voltages, one `N`-point sequence per channel
    pub trace: Option<VoltageBuffer>,
    /// Freshness of `trace`
    pub status: TraceStatus,
    /// Zoom in effect when `trace` was computed
    pub zoom: ZoomState,
    /// Config the trace was acquired with (or the pending config)
    pub config: AcquisitionConfig,
    /// Input voltage range
    pub voltage_range: VoltageRange,
    /// Whether acquisition is running (false = frozen)
    pub running: bool,
    /// Whether the next ready frame freezes acquisition
    pub single_sweep_armed: bool,
    /// When the snapshot was taken
    pub taken_at: DateTime<Local>,
}

impl DisplaySnapshot {
    /// Whether a fresh trace is available
    pub fn is_fresh(&self) -> bool {
        self.status == TraceStatus::Fresh && self.trace.is_some()
    }
}

/// Consumer of display snapshots
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send {
    /// Present a snapshot
    fn render(&mut self, snapshot: &DisplaySnapshot);
}

/// Renderer that summarizes each snapshot in the log (headless mode)
#[derive(Debug, Default)]
pub struct LogRenderer {
    rendered: u64,
}

impl LogRenderer {
    /// Create a new log renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots rendered so far
    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &DisplaySnapshot) {
        self.rendered += 1;
        let config = &snapshot.config;
        match (&snapshot.trace, snapshot.status) {
            (Some(trace), TraceStatus::Fresh) => {
                let ranges: Vec<String> = trace
                    .channels()
                    .map(|ch| {
                        let (lo, hi) = ch
                            .iter()
                            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                                (lo.min(v), hi.max(v))
                            });
                        format!("{:.2}..{:.2} V", lo, hi)
                    })
                    .collect();
                tracing::info!(
                    "Trace {}T x{}{} {} ch, trig {}: {}",
                    config.sampling_mode.tag(),
                    snapshot.zoom.factor(),
                    snapshot.zoom.interpolation.tag(),
                    config.channel_count,
                    config.trigger_symbol(),
                    ranges.join(", ")
                );
            }
            _ => tracing::info!(
                "No fresh trace (running: {}, single sweep armed: {})",
                snapshot.running,
                snapshot.single_sweep_armed
            ),
        }
    }
}

/// Renderer that forwards snapshots to a UI thread
pub struct ChannelRenderer {
    sender: Sender<DisplaySnapshot>,
    waker: Option<Box<dyn Fn() + Send>>,
}

impl ChannelRenderer {
    /// Forward snapshots over `sender`
    pub fn new(sender: Sender<DisplaySnapshot>) -> Self {
        Self {
            sender,
            waker: None,
        }
    }

    /// Call `waker` after each forwarded snapshot (e.g. to request a repaint)
    pub fn with_waker(mut self, waker: impl Fn() + Send + 'static) -> Self {
        self.waker = Some(Box::new(waker));
        self
    }
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, snapshot: &DisplaySnapshot) {
        match self.sender.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("UI is behind, dropping snapshot");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("UI has gone away, dropping snapshot");
                return;
            }
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}
