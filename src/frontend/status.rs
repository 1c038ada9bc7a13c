//! Status line and window title text

use crate::renderer::DisplaySnapshot;
use crate::types::{VoltageRange, SAMPLES_PER_CHANNEL};

/// Graticule layout: divisions on each side of the centre lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graticule {
    pub divisions_x: u32,
    pub divisions_y: u32,
}

impl Default for Graticule {
    fn default() -> Self {
        Self {
            divisions_x: 5,
            divisions_y: 4,
        }
    }
}

impl Graticule {
    /// Volts per horizontal division in XY mode
    pub fn volts_per_div_x(&self, range: &VoltageRange) -> f64 {
        range.span() / 2.0 / f64::from(self.divisions_x.max(1))
    }

    /// Volts per vertical division
    pub fn volts_per_div_y(&self, range: &VoltageRange) -> f64 {
        range.span() / 2.0 / f64::from(self.divisions_y.max(1))
    }

    /// Whole samples per horizontal division at unit zoom
    pub fn samples_per_div(&self) -> usize {
        SAMPLES_PER_CHANNEL / 2 / self.divisions_x.max(1) as usize
    }
}

/// One-line summary of the acquisition settings shown under the trace
pub fn status_line(snapshot: &DisplaySnapshot, graticule: &Graticule, xy: bool) -> String {
    let config = &snapshot.config;
    let zoom = snapshot.zoom.factor();
    let dt = config.sample_period_us().unwrap_or(0.0);
    let mode = config.sampling_mode.tag();
    let trigger = config.trigger_symbol();
    let vdiv_y = graticule.volts_per_div_y(&snapshot.voltage_range);

    let zoom_tag = if zoom > 1 {
        format!(" (x{}{})", zoom, snapshot.zoom.interpolation.tag())
    } else {
        String::new()
    };

    if xy {
        let vdiv_x = graticule.volts_per_div_x(&snapshot.voltage_range);
        let sweep_ms = SAMPLES_PER_CHANNEL as f64 * dt / 1000.0 / zoom as f64;
        format!(
            "{:.2} V/divX, {:.2} V/divY, {:.2} ms {}T{}, {}",
            vdiv_x, vdiv_y, sweep_ms, mode, zoom_tag, trigger
        )
    } else {
        let us_per_div = graticule.samples_per_div() as f64 * dt / zoom as f64;
        let channels = config.channel_count;
        let plural = if channels > 1 { "s" } else { "" };
        if zoom > 1 {
            format!(
                "{:.1} us/div {}T{}, {:.1} V/div, {} ch{}, {}",
                us_per_div, mode, zoom_tag, vdiv_y, channels, plural, trigger
            )
        } else {
            format!(
                "{:.1} us/div {}T, {:.2} V/div, {} ch{}, {}",
                us_per_div, mode, vdiv_y, channels, plural, trigger
            )
        }
    }
}

/// Window title reflecting the run mode
pub fn window_title(snapshot: &DisplaySnapshot) -> &'static str {
    if !snapshot.running {
        "ascope [frozen]"
    } else if snapshot.single_sweep_armed {
        "ascope [single-sweep]"
    } else {
        "ascope"
    }
}

/// Read-out for a pointer position in plot coordinates
///
/// In time mode `x` is a display point index; in XY mode both axes are volts.
pub fn pointer_readout(snapshot: &DisplaySnapshot, x: f64, y: f64, xy: bool) -> String {
    if xy {
        format!("{:.2} V, {:.2} V", x, y)
    } else {
        let dt = snapshot.config.sample_period_us().unwrap_or(0.0);
        let t = x * dt / snapshot.zoom.factor() as f64;
        format!("{:.1} us, {:.2} V", t, y)
    }
}
