mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::AirQualityApp;
use config::DashboardConfig;
use eframe::egui;
use state::AppState;

/// Loaded at startup when no path is given on the command line.
const DEFAULT_DATA_FILE: &str = "all_data.csv";

fn initial_path() -> Option<PathBuf> {
    std::env::args_os().nth(1).map(PathBuf::from).or_else(|| {
        let fallback = PathBuf::from(DEFAULT_DATA_FILE);
        fallback.exists().then_some(fallback)
    })
}

fn main() -> eframe::Result {
    env_logger::init();

    let mut state = AppState::new(DashboardConfig::load());
    if let Some(path) = initial_path() {
        state.open_path(&path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Air Quality Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(AirQualityApp::new(state)))),
    )
}
