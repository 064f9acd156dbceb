//! Seoul Apartment Explorer Main Application
//! Main window with control panel and chart viewer.

use crate::config::DashboardConfig;
use crate::data::DataLoader;
use crate::gui::dashboard::DashboardView;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction};
use egui::SidePanel;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const HANGUL_FONT: &str = "hangul";

/// Main application window.
pub struct ExplorerApp {
    loader: DataLoader,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,
}

impl ExplorerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        if let Some(font_path) = &config.font_path {
            install_font(&cc.egui_ctx, font_path);
        }

        let mut app = Self {
            loader: DataLoader::new(config.loader),
            control_panel: ControlPanel::new(config.sources),
            chart_viewer: ChartViewer::new(),
        };

        if app.control_panel.settings.sources.detail.exists() {
            app.handle_load();
        }
        app
    }

    /// Pick the transaction-detail CSV
    fn handle_browse_detail(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            self.control_panel.settings.sources.detail = path;
            self.handle_load();
        }
    }

    /// Pick the pre-aggregated monthly summary CSV
    fn handle_browse_summary(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            self.control_panel.settings.sources.summary = Some(path);
            self.handle_load();
        }
    }

    fn handle_clear_summary(&mut self) {
        self.control_panel.settings.sources.summary = None;
        self.handle_load();
    }

    /// Load both sources; a failed load leaves the dashboard empty.
    fn handle_load(&mut self) {
        let sources = self.control_panel.settings.sources.clone();
        match self.loader.load(&sources) {
            Ok(dataset) => {
                self.control_panel.update_options(&dataset);
                let status = if dataset.summary_is_computed() {
                    format!(
                        "Loaded {} rows ({} monthly groups computed)",
                        dataset.detail().len(),
                        dataset.summary().len()
                    )
                } else {
                    format!(
                        "Loaded {} rows, {} summary rows",
                        dataset.detail().len(),
                        dataset.summary().len()
                    )
                };
                self.control_panel.set_status(&status);
                self.recompute();
            }
            Err(e) => {
                warn!(error = %e, "dataset load failed");
                self.loader.clear();
                self.chart_viewer.clear();
                self.control_panel.export_enabled = false;
                self.control_panel.warning = None;
                self.control_panel.set_status(&format!("Error: {}", e));
            }
        }
    }

    fn handle_districts_changed(&mut self) {
        if let Some(dataset) = self.loader.dataset() {
            self.control_panel.refresh_neighborhoods(&dataset);
        }
        self.recompute();
    }

    /// Rebuild every chart and table for the current selection.
    fn recompute(&mut self) {
        let Some(dataset) = self.loader.dataset() else {
            return;
        };
        let view = DashboardView::compute(&dataset, &self.control_panel.settings);
        self.chart_viewer.set_view(view);
        self.control_panel.export_enabled = true;
    }

    /// Write the tables as CSV into a chosen folder and open it.
    fn handle_export(&mut self) {
        let Some(view) = &self.chart_viewer.view else {
            self.control_panel.set_status("Nothing to export");
            return;
        };
        let Some(dir) = rfd::FileDialog::new().pick_folder() else {
            return;
        };

        match view.export(&dir) {
            Ok(written) => {
                info!(dir = %dir.display(), files = written.len(), "tables exported");
                self.control_panel
                    .set_status(&format!("Exported {} tables", written.len()));
                if let Err(e) = open::that(&dir) {
                    warn!(error = %e, "could not open export folder");
                }
            }
            Err(e) => {
                warn!(error = %e, "export failed");
                self.control_panel.set_status(&format!("Export error: {}", e));
            }
        }
    }
}

/// Register a Hangul-capable font ahead of egui's defaults.
fn install_font(ctx: &egui::Context, path: &Path) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "font not loaded");
            return;
        }
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        HANGUL_FONT.to_owned(),
        Arc::new(egui::FontData::from_owned(bytes)),
    );
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .insert(0, HANGUL_FONT.to_owned());
    }
    ctx.set_fonts(fonts);
    info!(path = %path.display(), "font installed");
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::BrowseDetail => self.handle_browse_detail(),
                        ControlPanelAction::BrowseSummary => self.handle_browse_summary(),
                        ControlPanelAction::ClearSummary => self.handle_clear_summary(),
                        ControlPanelAction::Load => self.handle_load(),
                        ControlPanelAction::DistrictsChanged => self.handle_districts_changed(),
                        ControlPanelAction::SelectionChanged => self.recompute(),
                        ControlPanelAction::Export => self.handle_export(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer.show(ui);
        });
    }
}
