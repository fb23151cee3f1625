use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::data::model::Pollutant;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filter");
    ui.separator();

    let (Some(params), Some((min_ts, max_ts))) = (
        state.params.clone(),
        state.dataset.as_ref().and_then(|ds| ds.time_span),
    ) else {
        ui.label("No dataset loaded.");
        return;
    };
    let (min_date, max_date) = (min_ts.date(), max_ts.date());

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Date range ----
            ui.strong("Date range");
            let mut start = params.start_date;
            let mut end = params.end_date;
            egui::Grid::new("date_range").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("From");
                ui.add(DatePickerButton::new(&mut start).id_salt("start_date"));
                ui.end_row();
                ui.label("To");
                ui.add(DatePickerButton::new(&mut end).id_salt("end_date"));
                ui.end_row();
            });
            ui.label(
                RichText::new(format!("Available: {min_date} – {max_date}"))
                    .small()
                    .weak(),
            );

            if ui.small_button("Reset").clicked() {
                state.reset_date_range();
            } else {
                state.set_date_range(
                    start.clamp(min_date, max_date),
                    end.clamp(min_date, max_date),
                );
            }
            ui.separator();

            // ---- Pollutant multiselect ----
            ui.strong("Select Pollutants");
            for p in Pollutant::ALL {
                let mut checked = params.selected_pollutants.contains(&p);
                if ui.checkbox(&mut checked, p.column_name()).changed() {
                    state.set_pollutant_selected(p, checked);
                }
            }
            ui.separator();

            let mut show = state.show_correlation;
            if ui.checkbox(&mut show, "Show Correlation Matrix").changed() {
                state.set_show_correlation(show);
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.result.is_some(), egui::Button::new("Export summary…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(ds), Some(result)) = (&state.dataset, &state.result) {
            ui.label(format!(
                "{} rows loaded, {} in range",
                ds.len(),
                result.total_count
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open air-quality data")
        .add_filter("Supported files", &["csv", "parquet", "pq", "json"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(&path);
    }
}

pub fn export_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export summary")
        .set_file_name("summary.json")
        .add_filter("JSON", &["json"])
        .save_file();

    if let Some(path) = file {
        match state.export_summary(&path) {
            Ok(()) => state.status_message = None,
            Err(e) => {
                log::error!("Failed to export summary: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
