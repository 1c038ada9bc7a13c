//! Scope plot using egui_plot
//!
//! The plot has fixed bounds: 0..N samples horizontally and the input
//! voltage range vertically (or voltage on both axes in XY mode). Dragging,
//! zooming and scrolling are disabled; magnification is done by resampling.

use super::status::Graticule;
use crate::renderer::DisplaySnapshot;
use crate::types::{VoltageBuffer, SAMPLES_PER_CHANNEL};
use egui::{Color32, Ui};
use egui_plot::{HLine, Line, Plot, PlotBounds, PlotPoints, PlotUi, VLine};

/// Trace colors by channel
pub const CHANNEL_COLORS: [Color32; 2] = [
    Color32::from_rgb(255, 220, 60),
    Color32::from_rgb(80, 200, 255),
];

const GRID_COLOR: Color32 = Color32::from_gray(70);
const AXIS_COLOR: Color32 = Color32::from_gray(120);

/// Draw the scope plot, returning the pointer position in plot coordinates
pub fn show_scope_plot(
    ui: &mut Ui,
    snapshot: &DisplaySnapshot,
    graticule: &Graticule,
    xy: bool,
    line_width: f32,
) -> Option<[f64; 2]> {
    let range = snapshot.voltage_range;
    let (x_min, x_max) = if xy {
        (range.v_min, range.v_max)
    } else {
        (0.0, SAMPLES_PER_CHANNEL as f64)
    };

    let plot = Plot::new("scope_plot")
        .allow_zoom(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false)
        .show_grid(false)
        .show_axes(false)
        .show_x(false)
        .show_y(false);

    let response = plot.show(ui, |plot_ui| {
        plot_ui.set_plot_bounds(PlotBounds::from_min_max(
            [x_min, range.v_min],
            [x_max, range.v_max],
        ));
        plot_ui.set_auto_bounds(egui::Vec2b::new(false, false));

        draw_graticule(plot_ui, graticule, [x_min, x_max], [range.v_min, range.v_max]);

        if let Some(trace) = &snapshot.trace {
            if xy && trace.channel_count() == 2 {
                draw_xy(plot_ui, trace, line_width);
            } else {
                draw_channels(plot_ui, trace, line_width);
            }
        }
    });

    response
        .response
        .hover_pos()
        .map(|pos| response.transform.value_from_position(pos))
        .map(|p| [p.x, p.y])
}

fn draw_graticule(plot_ui: &mut PlotUi, graticule: &Graticule, x: [f64; 2], y: [f64; 2]) {
    let divisions = |lo: f64, hi: f64, per_side: u32| -> Vec<f64> {
        let centre = (lo + hi) / 2.0;
        let step = (hi - lo) / 2.0 / f64::from(per_side.max(1));
        (1..=per_side)
            .flat_map(|k| [centre - step * f64::from(k), centre + step * f64::from(k)])
            .collect()
    };

    for pos in divisions(x[0], x[1], graticule.divisions_x) {
        plot_ui.vline(VLine::new("", pos).color(GRID_COLOR).width(1.0));
    }
    for pos in divisions(y[0], y[1], graticule.divisions_y) {
        plot_ui.hline(HLine::new("", pos).color(GRID_COLOR).width(1.0));
    }
    plot_ui.vline(VLine::new("", (x[0] + x[1]) / 2.0).color(AXIS_COLOR).width(1.0));
    plot_ui.hline(HLine::new("", (y[0] + y[1]) / 2.0).color(AXIS_COLOR).width(1.0));
}

fn draw_channels(plot_ui: &mut PlotUi, trace: &VoltageBuffer, line_width: f32) {
    for (index, samples) in trace.channels().enumerate() {
        let points: Vec<[f64; 2]> = samples
            .iter()
            .enumerate()
            .map(|(k, &v)| [k as f64, v])
            .collect();
        let color = CHANNEL_COLORS[index % CHANNEL_COLORS.len()];
        plot_ui.line(
            Line::new(format!("ch{}", index + 1), PlotPoints::from(points))
                .color(color)
                .width(line_width),
        );
    }
}

fn draw_xy(plot_ui: &mut PlotUi, trace: &VoltageBuffer, line_width: f32) {
    let (Some(x), Some(y)) = (trace.channel(0), trace.channel(1)) else {
        return;
    };
    let points: Vec<[f64; 2]> = x.iter().zip(y).map(|(&a, &b)| [a, b]).collect();
    plot_ui.line(
        Line::new("xy", PlotPoints::from(points))
            .color(CHANNEL_COLORS[0])
            .width(line_width),
    );
}
