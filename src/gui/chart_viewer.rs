//! Chart Viewer Widget
//! Right side scrollable panel showing the dashboard cards.

use crate::charts::ChartPlotter;
use crate::data::Metric;
use crate::gui::dashboard::DashboardView;
use crate::stats::Granularity;
use egui::{Color32, RichText, ScrollArea};

const CARD_SPACING: f32 = 15.0;
const CARD_BORDER: Color32 = Color32::from_rgb(100, 149, 237);

/// Scrollable dashboard of chart and table cards.
#[derive(Default)]
pub struct ChartViewer {
    pub view: Option<DashboardView>,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all charts
    pub fn clear(&mut self) {
        self.view = None;
    }

    pub fn set_view(&mut self, view: DashboardView) {
        self.view = Some(view);
    }

    /// Draw the dashboard cards
    pub fn show(&mut self, ui: &mut egui::Ui) {
        let Some(view) = &self.view else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        };

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if !view.has_selection {
                    ui.label(
                        RichText::new("왼쪽에서 자치구와 법정동을 선택하세요.")
                            .size(14.0)
                            .color(Color32::GRAY),
                    );
                    ui.add_space(CARD_SPACING);
                }

                Self::card(ui, "① 선택 지역의 월별 평균가격 및 평당가격 추이", |ui| {
                    ui.columns(2, |columns| {
                        ChartPlotter::draw_trend_chart(
                            &mut columns[0],
                            "region_price_trend",
                            &view.region_price_trend,
                            Metric::DealAmount.label(),
                        );
                        ChartPlotter::draw_trend_chart(
                            &mut columns[1],
                            "region_per_area_trend",
                            &view.region_per_area_trend,
                            Metric::PricePerArea.label(),
                        );
                    });
                });

                Self::card(ui, "② 서울 전체 자치구 평당가격 비교", |ui| {
                    ChartPlotter::draw_district_bars(
                        ui,
                        "district_bars",
                        &view.district_bars,
                        &view.selected_districts,
                    );
                });

                Self::card(ui, "③ 서울 전체 단지의 평당가격 산점도", |ui| {
                    ChartPlotter::draw_scatter(ui, "complex_scatter", &view.scatter);
                });

                let comparison_title = format!("④ 선택 지역 vs 서울 전체: {}", view.metric.label());
                Self::card(ui, &comparison_title, |ui| {
                    ui.columns(2, |columns| {
                        ChartPlotter::draw_trend_chart(
                            &mut columns[0],
                            "selection_trend",
                            &view.selection_trend,
                            view.metric.label(),
                        );
                        ChartPlotter::draw_trend_chart(
                            &mut columns[1],
                            "comparison_trend",
                            &view.comparison_trend,
                            view.metric.label(),
                        );
                    });
                });

                let means_title = match view.granularity {
                    Granularity::District => "⑤ 지역별 평균 가격 및 평당가격 (구별)",
                    Granularity::Neighborhood => "⑤ 지역별 평균 가격 및 평당가격 (동별)",
                };
                Self::card(ui, means_title, |ui| {
                    ChartPlotter::draw_region_means_table(ui, "region_means", &view.region_means);
                });

                let extremes_title = format!(
                    "⑥ 월별 최고가/최저가 단지 ({}, {})",
                    view.extremal_district.as_deref().unwrap_or("-"),
                    view.metric.label()
                );
                let extremes = view.extremes_for(view.metric);
                Self::card(ui, &extremes_title, |ui| {
                    ui.columns(2, |columns| {
                        columns[0].label(RichText::new("📈 월별 최고가 단지").size(13.0).strong());
                        ChartPlotter::draw_extremes_table(
                            &mut columns[0],
                            "extremes_high",
                            extremes,
                            view.metric,
                            true,
                        );
                        columns[1].label(RichText::new("📉 월별 최저가 단지").size(13.0).strong());
                        ChartPlotter::draw_extremes_table(
                            &mut columns[1],
                            "extremes_low",
                            extremes,
                            view.metric,
                            false,
                        );
                    });
                });
            });
    }

    /// Draw a titled card frame around `content`.
    fn card(ui: &mut egui::Ui, title: &str, content: impl FnOnce(&mut egui::Ui)) {
        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(1.5, CARD_BORDER))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(RichText::new(title).size(16.0).strong().color(CARD_BORDER));
                ui.add_space(8.0);
                content(ui);
            });
        ui.add_space(CARD_SPACING);
    }
}
