use eframe::egui::{
    Align2, Color32, FontId, Rect, RichText, ScrollArea, Sense, Stroke, Ui, Vec2, pos2,
};
use egui_plot::{Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Plot, PlotPoints, Points};

use crate::color::{heat_color, normalize, rgb};
use crate::data::aggregate::AggregateResult;
use crate::data::filter::FilterParams;
use crate::data::model::Pollutant;
use crate::data::stats::{CorrelationMatrix, StationBox};
use crate::state::AppState;

/// Histogram order on the dashboard.
const HISTOGRAM_ORDER: [Pollutant; Pollutant::COUNT] = [
    Pollutant::Pm25,
    Pollutant::Pm10,
    Pollutant::No2,
    Pollutant::So2,
    Pollutant::O3,
    Pollutant::Co,
];

/// Pollutants with an "Average" tile, after the total count.
const METRIC_ORDER: [Pollutant; 5] = [
    Pollutant::Pm25,
    Pollutant::Pm10,
    Pollutant::So2,
    Pollutant::No2,
    Pollutant::Co,
];

const HIST_FILL: Color32 = Color32::from_rgb(135, 206, 235);
const CHART_HEIGHT: f32 = 240.0;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render every dashboard section for the current selection.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    let (Some(params), Some(result)) = (&state.params, &state.result) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view air quality  (File → Open…)");
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Air Quality Dashboard");
            ui.label(format!(
                "Displaying data from {} to {}.",
                params.start_date, params.end_date
            ));

            section(ui, "Statistic values of data");
            metrics_grid(ui, state, result);

            section(ui, "Data Distribution for each pollutant column");
            histograms(ui, state, result);

            section(ui, "Count of Data by Station");
            station_bar_chart(ui, state, result);

            if !params.selected_pollutants.is_empty() {
                section(ui, "Boxplots for Selected Pollutant Levels Across Different Stations");
                boxplots(ui, state, params, result);
            }

            if let Some(matrix) = &result.correlation {
                section(ui, "Correlation Matrix of Pollutants");
                correlation_heatmap(ui, matrix);
            }
        });
}

fn section(ui: &mut Ui, title: &str) {
    ui.add_space(12.0);
    ui.label(RichText::new(title).size(18.0).strong());
    ui.separator();
}

fn format_mean(mean: Option<f64>) -> String {
    mean.map_or_else(|| "–".to_string(), |v| format!("{v:.2}"))
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

fn metrics_grid(ui: &mut Ui, state: &AppState, result: &AggregateResult) {
    let mut tiles = vec![("Total Data".to_string(), result.total_count.to_string())];
    tiles.extend(
        METRIC_ORDER
            .iter()
            .map(|&p| (format!("Average {p}"), format_mean(result.mean(p)))),
    );

    let per_row = state.config.columns_per_row;
    for row in tiles.chunks(per_row) {
        ui.columns(per_row, |cols: &mut [Ui]| {
            for (col, (label, value)) in cols.iter_mut().zip(row) {
                col.group(|ui: &mut Ui| {
                    ui.set_min_width(ui.available_width());
                    ui.label(label);
                    ui.label(RichText::new(value).size(28.0).strong());
                });
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

fn histograms(ui: &mut Ui, state: &AppState, result: &AggregateResult) {
    let per_row = state.config.columns_per_row;
    for row in HISTOGRAM_ORDER.chunks(per_row) {
        ui.columns(per_row, |cols: &mut [Ui]| {
            for (col, &p) in cols.iter_mut().zip(row) {
                col.strong(p.column_name());
                let Some(h) = result.histograms.get(&p) else {
                    col.label("No data");
                    continue;
                };
                let bars: Vec<Bar> = h
                    .counts
                    .iter()
                    .enumerate()
                    .map(|(i, &count)| {
                        Bar::new(h.bin_center(i), count as f64)
                            .width(h.bin_width())
                            .fill(HIST_FILL)
                            .stroke(Stroke::new(1.0, Color32::BLACK))
                    })
                    .collect();
                Plot::new(format!("hist_{p}"))
                    .height(CHART_HEIGHT)
                    .y_axis_label("Count")
                    .allow_drag(false)
                    .allow_scroll(false)
                    .show(col, |plot_ui| {
                        plot_ui.bar_chart(BarChart::new(bars).name(p.column_name()));
                    });
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Station counts
// ---------------------------------------------------------------------------

/// Axis formatter that shows `labels[i]` at integer position `i`.
fn category_formatter(labels: Vec<String>) -> impl Fn(GridMark, &std::ops::RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let idx = mark.value.round();
        if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

fn station_bar_chart(ui: &mut Ui, state: &AppState, result: &AggregateResult) {
    if result.station_counts.is_empty() {
        ui.label("No data in the selected range.");
        return;
    }
    let highlight = rgb(state.config.highlight_color);
    let default = rgb(state.config.default_bar_color);
    let n = result.station_counts.len();

    // Largest count at the top: position 0 is the bottom of the y axis.
    let mut labels = vec![String::new(); n];
    let bars: Vec<Bar> = result
        .station_counts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let pos = n - 1 - i;
            labels[pos] = c.station.clone();
            let fill = if result.dominant_station.as_deref() == Some(c.station.as_str()) {
                highlight
            } else {
                default
            };
            Bar::new(pos as f64, c.count as f64)
                .name(&c.station)
                .width(0.8)
                .fill(fill)
        })
        .collect();

    Plot::new("station_counts")
        .height((n as f32 * 28.0).max(CHART_HEIGHT))
        .x_axis_label("Count of Data")
        .y_axis_label("Station")
        .y_axis_formatter(category_formatter(labels))
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal());
        });
}

// ---------------------------------------------------------------------------
// Boxplots
// ---------------------------------------------------------------------------

fn boxplots(ui: &mut Ui, state: &AppState, params: &FilterParams, result: &AggregateResult) {
    let per_row = state.config.boxplot_columns_per_row;
    for row in params.selected_pollutants.chunks(per_row) {
        ui.columns(per_row, |cols: &mut [Ui]| {
            for (col, &p) in cols.iter_mut().zip(row) {
                col.strong(format!("{p} Levels Across Different Stations"));
                match result.boxplots.get(&p) {
                    Some(boxes) if !boxes.is_empty() => station_boxplot(col, state, p, boxes),
                    _ => {
                        col.label("No data");
                    }
                }
            }
        });
    }
}

fn station_boxplot(ui: &mut Ui, state: &AppState, pollutant: Pollutant, boxes: &[StationBox]) {
    let color_for = |station: &str| {
        state
            .station_colors
            .as_ref()
            .map_or(Color32::LIGHT_BLUE, |c| c.color_for(station))
    };
    let labels: Vec<String> = boxes.iter().map(|b| b.station.clone()).collect();

    let elems: Vec<BoxElem> = boxes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let s = &b.summary;
            let color = color_for(&b.station);
            BoxElem::new(
                i as f64,
                BoxSpread::new(s.lower_whisker, s.q1, s.median, s.q3, s.upper_whisker),
            )
            .name(&b.station)
            .box_width(0.6)
            .whisker_width(0.3)
            .fill(color.linear_multiply(0.4))
            .stroke(Stroke::new(1.5, color))
        })
        .collect();

    let outliers: Vec<[f64; 2]> = boxes
        .iter()
        .enumerate()
        .flat_map(|(i, b)| b.summary.outliers.iter().map(move |&v| [i as f64, v]))
        .collect();

    Plot::new(format!("box_{pollutant}"))
        .height(CHART_HEIGHT)
        .x_axis_label("Station")
        .y_axis_label(format!("{pollutant} Concentration (µg/m³ or mg/m³)"))
        .x_axis_formatter(category_formatter(labels))
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(elems).name(pollutant.column_name()));
            if !outliers.is_empty() {
                plot_ui.points(
                    Points::new(PlotPoints::from(outliers))
                        .radius(1.5)
                        .color(Color32::DARK_GRAY),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Correlation heatmap
// ---------------------------------------------------------------------------

fn correlation_heatmap(ui: &mut Ui, matrix: &CorrelationMatrix) {
    let n = Pollutant::COUNT as f32;
    let label_width = 56.0;
    let cell = Vec2::new(72.0, 34.0);
    let size = Vec2::new(label_width + cell.x * n, cell.y * (n + 1.0));

    let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);
    let font = FontId::proportional(13.0);
    let text_color = ui.visuals().text_color();
    let (lo, hi) = matrix.value_range().unwrap_or((0.0, 1.0));

    for (row, a) in Pollutant::ALL.into_iter().enumerate() {
        let top = rect.top() + cell.y * row as f32;
        painter.text(
            pos2(rect.left() + label_width - 6.0, top + cell.y / 2.0),
            Align2::RIGHT_CENTER,
            a.column_name(),
            font.clone(),
            text_color,
        );
        for (col, b) in Pollutant::ALL.into_iter().enumerate() {
            let min = pos2(rect.left() + label_width + cell.x * col as f32, top);
            let cell_rect = Rect::from_min_size(min, cell);
            let (fill, text) = match matrix.get(a, b) {
                Some(r) => (heat_color(normalize(r, lo, hi)), format!("{r:.2}")),
                None => (Color32::LIGHT_GRAY, "–".to_string()),
            };
            painter.rect_filled(cell_rect.shrink(1.0), 0.0, fill);
            painter.text(
                cell_rect.center(),
                Align2::CENTER_CENTER,
                text,
                font.clone(),
                Color32::BLACK,
            );
        }
    }

    let label_y = rect.top() + cell.y * (n + 0.5);
    for (col, b) in Pollutant::ALL.into_iter().enumerate() {
        painter.text(
            pos2(rect.left() + label_width + cell.x * (col as f32 + 0.5), label_y),
            Align2::CENTER_CENTER,
            b.column_name(),
            font.clone(),
            text_color,
        );
    }
    ui.add_space(8.0);
}
