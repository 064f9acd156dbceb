//! Control Panel Widget
//! Left side panel with source selection and analysis filters.

use crate::config::SourcePaths;
use crate::data::{DataProcessor, Dataset, Metric, RegionFilter, YearRange};
use crate::stats::{Granularity, RegionOrder};
use egui::{Color32, ComboBox, RichText, ScrollArea};
use std::path::Path;

/// User selections driving every dashboard query.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserSettings {
    pub sources: SourcePaths,
    pub districts: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub year_from: i32,
    pub year_to: i32,
    pub limit_years: bool,
    pub metric: Metric,
    pub granularity: Granularity,
    pub region_order: RegionOrder,
    pub extremal_district: Option<String>,
}

impl UserSettings {
    pub fn region_filter(&self) -> RegionFilter {
        RegionFilter::from_selection(&self.districts, &self.neighborhoods)
    }

    pub fn year_range(&self) -> Option<YearRange> {
        self.limit_years
            .then(|| YearRange::new(self.year_from, self.year_to))
    }
}

/// Left side control panel with file selection and filter controls.
pub struct ControlPanel {
    pub settings: UserSettings,
    pub districts: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub year_bounds: Option<(i32, i32)>,
    pub status: String,
    pub warning: Option<String>,
    pub export_enabled: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            settings: UserSettings::default(),
            districts: Vec::new(),
            neighborhoods: Vec::new(),
            year_bounds: None,
            status: "Ready".to_string(),
            warning: None,
            export_enabled: false,
        }
    }
}

impl ControlPanel {
    pub fn new(sources: SourcePaths) -> Self {
        let mut panel = Self::default();
        panel.settings.sources = sources;
        panel
    }

    /// Refresh the pickers after a dataset load, keeping still-valid picks.
    pub fn update_options(&mut self, dataset: &Dataset) {
        self.districts = DataProcessor::districts(dataset.detail());
        let districts = &self.districts;
        self.settings.districts.retain(|d| districts.contains(d));
        if self
            .settings
            .extremal_district
            .as_ref()
            .is_some_and(|d| !districts.contains(d))
        {
            self.settings.extremal_district = None;
        }
        if self.settings.extremal_district.is_none() {
            self.settings.extremal_district = self.districts.first().cloned();
        }

        let years = DataProcessor::years(dataset.detail());
        self.year_bounds = match (years.first(), years.last()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        };
        if let Some((first, last)) = self.year_bounds {
            if !(first..=last).contains(&self.settings.year_from) {
                self.settings.year_from = first;
            }
            if !(first..=last).contains(&self.settings.year_to) {
                self.settings.year_to = last;
            }
        }

        self.warning = dataset.report().warning();
        self.refresh_neighborhoods(dataset);
    }

    /// Neighborhood choices follow the district picks.
    pub fn refresh_neighborhoods(&mut self, dataset: &Dataset) {
        self.neighborhoods = DataProcessor::neighborhoods(dataset.detail(), &self.settings.districts);
        let neighborhoods = &self.neighborhoods;
        self.settings
            .neighborhoods
            .retain(|n| neighborhoods.contains(n));
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("🏙 서울 아파트 시세")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(RichText::new("Price Explorer").size(11.0).color(Color32::GRAY));
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Detail:").size(12.0));
                    ui.label(file_label(Some(self.settings.sources.detail.as_path())));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📂").clicked() {
                            action = ControlPanelAction::BrowseDetail;
                        }
                    });
                });
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Summary:").size(12.0));
                    ui.label(file_label(self.settings.sources.summary.as_deref()));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📂").clicked() {
                            action = ControlPanelAction::BrowseSummary;
                        }
                        if self.settings.sources.summary.is_some() && ui.button("✖").clicked() {
                            action = ControlPanelAction::ClearSummary;
                        }
                    });
                });
            });

        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            let button = egui::Button::new(RichText::new("▶ Load Data").size(16.0))
                .min_size(egui::vec2(200.0, 32.0));
            if ui.add(button).clicked() {
                action = ControlPanelAction::Load;
            }
        });

        ui.add_space(10.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Region Section =====
        ui.label(RichText::new("📌 자치구 / 법정동").size(14.0).strong());
        ui.add_space(5.0);

        if self.districts.is_empty() {
            ui.label(RichText::new("No data loaded").color(Color32::GRAY));
        } else {
            ui.label("자치구:");
            if Self::multi_select(ui, "district_select", &self.districts, &mut self.settings.districts) {
                action = ControlPanelAction::DistrictsChanged;
            }

            ui.add_space(5.0);
            ui.label("법정동 (비우면 전체):");
            if Self::multi_select(
                ui,
                "neighborhood_select",
                &self.neighborhoods,
                &mut self.settings.neighborhoods,
            ) {
                action = ControlPanelAction::SelectionChanged;
            }
        }

        ui.add_space(10.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Period & Metric Section =====
        ui.label(RichText::new("⚙️ Analysis").size(14.0).strong());
        ui.add_space(5.0);

        if let Some((first, last)) = self.year_bounds {
            if ui
                .checkbox(&mut self.settings.limit_years, "연도 범위 제한")
                .changed()
            {
                action = ControlPanelAction::SelectionChanged;
            }
            ui.add_enabled_ui(self.settings.limit_years, |ui| {
                ui.horizontal(|ui| {
                    let from = ui.add(
                        egui::DragValue::new(&mut self.settings.year_from).range(first..=last),
                    );
                    ui.label("~");
                    let to =
                        ui.add(egui::DragValue::new(&mut self.settings.year_to).range(first..=last));
                    if from.changed() || to.changed() {
                        action = ControlPanelAction::SelectionChanged;
                    }
                });
            });
        }

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            for metric in Metric::ALL {
                if ui
                    .radio_value(&mut self.settings.metric, metric, metric.label())
                    .changed()
                {
                    action = ControlPanelAction::SelectionChanged;
                }
            }
        });

        ui.horizontal(|ui| {
            let district = ui.radio_value(&mut self.settings.granularity, Granularity::District, "구별");
            let neighborhood =
                ui.radio_value(&mut self.settings.granularity, Granularity::Neighborhood, "동별");
            if district.changed() || neighborhood.changed() {
                action = ControlPanelAction::SelectionChanged;
            }
        });

        ui.horizontal(|ui| {
            ui.label("정렬:");
            for (order, label) in [
                (RegionOrder::PricePerAreaDesc, "평당가순"),
                (RegionOrder::PriceDesc, "가격순"),
                (RegionOrder::KeyAsc, "이름순"),
            ] {
                if ui
                    .radio_value(&mut self.settings.region_order, order, label)
                    .changed()
                {
                    action = ControlPanelAction::SelectionChanged;
                }
            }
        });

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            ui.label("최고가/최저가 자치구:");
            let selected = self.settings.extremal_district.clone().unwrap_or_default();
            ComboBox::from_id_salt("extremal_district")
                .width(120.0)
                .selected_text(&selected)
                .show_ui(ui, |ui| {
                    for district in &self.districts {
                        if ui.selectable_label(selected == *district, district).clicked() {
                            self.settings.extremal_district = Some(district.clone());
                            action = ControlPanelAction::SelectionChanged;
                        }
                    }
                });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Export =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let button = egui::Button::new(RichText::new("📄 Export Tables").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::Export;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Status Section =====
        let status_color = if self.status.starts_with("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.starts_with("Loaded") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        if let Some(warning) = &self.warning {
            ui.add_space(5.0);
            ui.label(
                RichText::new(format!("⚠ {}", warning))
                    .size(11.0)
                    .color(Color32::from_rgb(243, 156, 18)),
            );
        }

        action
    }

    /// Checkbox list bound to a set of picks. Returns true on change.
    fn multi_select(
        ui: &mut egui::Ui,
        id: &str,
        options: &[String],
        picked: &mut Vec<String>,
    ) -> bool {
        let mut changed = false;
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(5.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt(id)
                    .max_height(140.0)
                    .show(ui, |ui| {
                        for option in options {
                            let mut checked = picked.contains(option);
                            if ui.checkbox(&mut checked, option).changed() {
                                toggle(picked, option, checked);
                                changed = true;
                            }
                        }
                    });
            });

        ui.horizontal(|ui| {
            if ui.small_button("Select All").clicked() {
                *picked = options.to_vec();
                changed = true;
            }
            if ui.small_button("Clear All").clicked() {
                picked.clear();
                changed = true;
            }
        });

        changed
    }

    /// Set status line
    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

fn file_label(path: Option<&Path>) -> RichText {
    match path.and_then(|p| p.file_name()) {
        Some(name) => RichText::new(name.to_string_lossy()).size(12.0),
        None => RichText::new("No file selected").size(12.0).color(Color32::GRAY),
    }
}

/// Add or remove `value`, keeping picks sorted.
fn toggle(picked: &mut Vec<String>, value: &str, checked: bool) {
    picked.retain(|p| p != value);
    if checked {
        picked.push(value.to_string());
        picked.sort();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseDetail,
    BrowseSummary,
    ClearSummary,
    Load,
    DistrictsChanged,
    SelectionChanged,
    Export,
}
