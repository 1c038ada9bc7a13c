//! Frontend module for egui UI
//!
//! The window only draws what the reactor sends it. Display snapshots arrive
//! over a crossbeam channel from [`crate::renderer::ChannelRenderer`]; key
//! presses go back as [`Command`]s.
//!
//! # Submodules
//!
//! - [`input`] - Key map
//! - `plot` - Scope plot with egui_plot
//! - [`status`] - Status line, window title and pointer read-out text

pub mod input;
mod plot;
pub mod status;

pub use input::KeyAction;
pub use status::Graticule;

use crate::acquisition::Command;
use crate::renderer::DisplaySnapshot;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use egui::{Color32, RichText};
use std::time::Duration;

/// Fallback repaint interval when no snapshot wakes the window
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Main application state for the scope window
pub struct ScopeApp {
    snapshots: Receiver<DisplaySnapshot>,
    commands: Sender<Command>,
    latest: Option<DisplaySnapshot>,
    graticule: Graticule,
    line_width: f32,
    xy_mode: bool,
    pointer: Option<[f64; 2]>,
    title: &'static str,
    reactor_gone: bool,
    quit_sent: bool,
}

impl ScopeApp {
    pub fn new(
        snapshots: Receiver<DisplaySnapshot>,
        commands: Sender<Command>,
        graticule: Graticule,
    ) -> Self {
        Self {
            snapshots,
            commands,
            latest: None,
            graticule,
            line_width: 1.5,
            xy_mode: false,
            pointer: None,
            title: "ascope",
            reactor_gone: false,
            quit_sent: false,
        }
    }

    /// Latest snapshot received
    pub fn latest(&self) -> Option<&DisplaySnapshot> {
        self.latest.as_ref()
    }

    /// Whether the trace is drawn channel 0 against channel 1
    pub fn is_xy(&self) -> bool {
        self.xy_mode
    }

    /// Whether the reactor has stopped sending snapshots
    pub fn is_reactor_gone(&self) -> bool {
        self.reactor_gone
    }

    /// Drain pending snapshots, keeping the newest. Returns true if any arrived.
    pub fn process_snapshots(&mut self) -> bool {
        let mut received = false;
        loop {
            match self.snapshots.try_recv() {
                Ok(snapshot) => {
                    self.latest = Some(snapshot);
                    received = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.reactor_gone {
                        tracing::info!("Reactor stopped, closing window");
                    }
                    self.reactor_gone = true;
                    break;
                }
            }
        }

        // XY needs exactly two channels
        if self.xy_mode && self.channel_count() != Some(2) {
            self.xy_mode = false;
        }
        received
    }

    /// Act on a key press. Returns true if the window should close.
    pub fn handle_action(&mut self, action: KeyAction) -> bool {
        if action == KeyAction::ToggleXy {
            if self.channel_count() == Some(2) {
                self.xy_mode = !self.xy_mode;
            }
            return false;
        }

        if let Some(command) = action.command(self.latest.as_ref()) {
            self.send(command);
            return command == Command::Quit;
        }
        false
    }

    fn channel_count(&self) -> Option<u8> {
        self.latest.as_ref().map(|s| s.config.channel_count)
    }

    fn send(&mut self, command: Command) {
        if command == Command::Quit {
            if self.quit_sent {
                return;
            }
            self.quit_sent = true;
        }
        tracing::debug!("Sending {:?}", command);
        if self.commands.send(command).is_err() {
            self.reactor_gone = true;
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) -> bool {
        let actions: Vec<KeyAction> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Text(text) => input::action_for_text(text),
                    egui::Event::Key {
                        key, pressed: true, ..
                    } => input::action_for_key(*key),
                    _ => None,
                })
                .collect()
        });

        let mut close = false;
        for action in actions {
            close |= self.handle_action(action);
        }
        close
    }

    fn render_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing.x = 8.0;

            let Some(snapshot) = &self.latest else {
                ui.colored_label(Color32::GRAY, "●");
                ui.label(RichText::new("Waiting for instrument").small());
                return;
            };

            let (color, text) = if !snapshot.running {
                (Color32::LIGHT_BLUE, "Frozen")
            } else if snapshot.is_fresh() {
                (Color32::GREEN, "Triggered")
            } else {
                (Color32::YELLOW, "Waiting")
            };
            ui.colored_label(color, "●");
            ui.label(RichText::new(text).small());

            ui.separator();
            ui.label(
                RichText::new(status::status_line(snapshot, &self.graticule, self.xy_mode))
                    .small()
                    .monospace(),
            );

            if let Some([x, y]) = self.pointer {
                ui.separator();
                ui.label(
                    RichText::new(status::pointer_readout(snapshot, x, y, self.xy_mode))
                        .small()
                        .monospace(),
                );
            }

            ui.separator();
            ui.label(
                RichText::new(snapshot.taken_at.format("%H:%M:%S").to_string()).small(),
            );
        });
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_snapshots();
        let mut close = self.handle_keyboard(ctx);

        if ctx.input(|i| i.viewport().close_requested()) {
            self.send(Command::Quit);
        }
        if self.reactor_gone {
            close = true;
        }
        if close {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        if let Some(snapshot) = &self.latest {
            let title = status::window_title(snapshot);
            if title != self.title {
                self.title = title;
                ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.to_string()));
            }
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.render_status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.pointer = match &self.latest {
                Some(snapshot) => plot::show_scope_plot(
                    ui,
                    snapshot,
                    &self.graticule,
                    self.xy_mode,
                    self.line_width,
                ),
                None => None,
            };
        });

        ctx.request_repaint_after(POLL_INTERVAL);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.send(Command::Quit);
    }
}
