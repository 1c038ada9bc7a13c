//! Renderer stand-ins for driving the reactor from integration tests

use ascope_rs::renderer::{DisplaySnapshot, Renderer};
use std::sync::{Arc, Mutex};

/// Renderer that keeps every snapshot it is given
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    snapshots: Arc<Mutex<Vec<DisplaySnapshot>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<DisplaySnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<DisplaySnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, snapshot: &DisplaySnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}
