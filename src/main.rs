//! Seoul Apartment Explorer - Transaction price dashboard
//!
//! Loads Seoul apartment sale records from CSV and shows regional price
//! trends, comparisons and monthly extremes in an interactive window.

mod charts;
mod config;
mod data;
mod gui;
mod stats;

use anyhow::anyhow;
use config::DashboardConfig;
use eframe::egui;
use gui::ExplorerApp;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DashboardConfig::from_env()?;
    info!(detail = %config.sources.detail.display(), "starting explorer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1200.0, 700.0])
            .with_title("Seoul Apartment Explorer"),
        ..Default::default()
    };

    eframe::run_native(
        "Seoul Apartment Explorer",
        options,
        Box::new(|cc| Ok(Box::new(ExplorerApp::new(cc, config)))),
    )
    .map_err(|e| anyhow!("eframe error: {e}"))
}
