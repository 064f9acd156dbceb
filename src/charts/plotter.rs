//! Chart Plotter Module
//! Creates interactive price charts and tables using egui_plot.

use crate::charts::format::{format_area, format_manwon, group_thousands};
use crate::data::{Metric, Period, PriceObservation, TransactionRecord};
use crate::stats::{PeriodExtremes, RegionMean, TrendPoint, CITYWIDE_LABEL, OTHER_LABEL, SELECTED_LABEL};
use egui::{Color32, RichText, ScrollArea};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};
use std::collections::BTreeMap;

pub const SELECTED_COLOR: Color32 = Color32::from_rgb(220, 20, 60); // Crimson
pub const OTHER_COLOR: Color32 = Color32::from_rgb(200, 200, 200); // Light gray
pub const CITYWIDE_COLOR: Color32 = Color32::from_rgb(52, 73, 94); // Slate

pub const PALETTE: [Color32; 10] = [
    Color32::from_rgb(52, 152, 219), // Blue
    Color32::from_rgb(231, 76, 60),  // Red
    Color32::from_rgb(46, 204, 113), // Green
    Color32::from_rgb(155, 89, 182), // Purple
    Color32::from_rgb(243, 156, 18), // Orange
    Color32::from_rgb(26, 188, 156), // Teal
    Color32::from_rgb(233, 30, 99),  // Pink
    Color32::from_rgb(0, 188, 212),  // Cyan
    Color32::from_rgb(121, 85, 72),  // Brown
    Color32::from_rgb(96, 125, 139), // Blue Grey
];

const CHART_HEIGHT: f32 = 280.0;

/// One complex transaction in the scatter chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub period: Period,
    pub price_per_area: f64,
    pub complex_name: String,
    pub region_label: String,
    pub highlighted: bool,
}

/// Creates price visualizations using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Color for a series; partition labels have fixed colors.
    pub fn series_color(label: &str, index: usize) -> Color32 {
        match label {
            SELECTED_LABEL => SELECTED_COLOR,
            OTHER_LABEL => OTHER_COLOR,
            CITYWIDE_LABEL => CITYWIDE_COLOR,
            _ => PALETTE[index % PALETTE.len()],
        }
    }

    /// X coordinate of a period on the month axis.
    pub fn period_x(period: Period) -> f64 {
        period.index() as f64
    }

    /// Axis label for month-axis grid marks that land on a whole month.
    pub fn period_tick(x: f64) -> String {
        if (x - x.round()).abs() > 1e-6 {
            return String::new();
        }
        Period::from_index(x.round() as i64)
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    /// Split trend points into one polyline per label, ordered by label.
    pub fn group_series(points: &[TrendPoint]) -> Vec<(String, Vec<[f64; 2]>)> {
        let mut series: BTreeMap<&str, Vec<[f64; 2]>> = BTreeMap::new();
        for point in points {
            series
                .entry(point.label.as_str())
                .or_default()
                .push([Self::period_x(point.period), point.mean]);
        }
        series
            .into_iter()
            .map(|(label, mut xy)| {
                xy.sort_by(|a, b| a[0].total_cmp(&b[0]));
                (label.to_string(), xy)
            })
            .collect()
    }

    /// Draw a line chart with one line per label.
    pub fn draw_trend_chart(ui: &mut egui::Ui, id: &str, points: &[TrendPoint], y_label: &str) {
        if points.is_empty() {
            Self::draw_empty(ui);
            return;
        }

        let series = Self::group_series(points);
        let y_axis = y_label.to_string();

        Plot::new(id)
            .height(CHART_HEIGHT)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("연월")
            .y_axis_label(y_label)
            .x_axis_formatter(|mark, _range| Self::period_tick(mark.value))
            .label_formatter(move |name, value| {
                let period = Self::period_tick(value.x.round());
                if name.is_empty() {
                    format!("{}\n{}: {}", period, y_axis, format_manwon(value.y))
                } else {
                    format!("{}\n{}\n{}: {}", name, period, y_axis, format_manwon(value.y))
                }
            })
            .show(ui, |plot_ui| {
                for (idx, (label, xy)) in series.iter().enumerate() {
                    let color = Self::series_color(label, idx);
                    let width = if label == CITYWIDE_LABEL { 2.5 } else { 1.5 };

                    plot_ui.line(
                        Line::new(PlotPoints::from_iter(xy.iter().copied()))
                            .color(color)
                            .width(width)
                            .name(label),
                    );
                    plot_ui.points(
                        Points::new(PlotPoints::from_iter(xy.iter().copied()))
                            .radius(2.5)
                            .color(color),
                    );
                }
            });
    }

    /// Draw district means as bars, selected districts highlighted.
    pub fn draw_district_bars(
        ui: &mut egui::Ui,
        id: &str,
        means: &[RegionMean],
        selected: &[String],
    ) {
        if means.is_empty() {
            Self::draw_empty(ui);
            return;
        }

        let labels: Vec<String> = means.iter().map(|m| m.label.clone()).collect();
        let (selected_bars, other_bars): (Vec<Bar>, Vec<Bar>) = means
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let is_selected = selected.contains(&m.district);
                let bar = Bar::new(i as f64, m.mean_price_per_area)
                    .width(0.7)
                    .name(&m.label)
                    .fill(if is_selected { SELECTED_COLOR } else { OTHER_COLOR });
                (is_selected, bar)
            })
            .fold((Vec::new(), Vec::new()), |(mut sel, mut oth), (is_selected, bar)| {
                if is_selected {
                    sel.push(bar);
                } else {
                    oth.push(bar);
                }
                (sel, oth)
            });

        Plot::new(id)
            .height(CHART_HEIGHT)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("자치구")
            .y_axis_label(Metric::PricePerArea.label())
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(BarChart::new(other_bars).color(OTHER_COLOR).name(OTHER_LABEL));
                plot_ui.bar_chart(
                    BarChart::new(selected_bars)
                        .color(SELECTED_COLOR)
                        .name(SELECTED_LABEL),
                );
            });
    }

    /// Draw complexes' price per area by month; hover shows the nearest complex.
    pub fn draw_scatter(ui: &mut egui::Ui, id: &str, points: &[ScatterPoint]) {
        if points.is_empty() {
            Self::draw_empty(ui);
            return;
        }

        let hover: Vec<([f64; 2], String)> = points
            .iter()
            .map(|p| {
                (
                    [Self::period_x(p.period), p.price_per_area],
                    format!("{} ({})", p.complex_name, p.region_label),
                )
            })
            .collect();

        let (highlighted, others): (Vec<&ScatterPoint>, Vec<&ScatterPoint>) =
            points.iter().partition(|p| p.highlighted);
        let to_xy = |subset: &[&ScatterPoint]| -> PlotPoints {
            subset
                .iter()
                .map(|p| [Self::period_x(p.period), p.price_per_area])
                .collect()
        };
        let other_xy = to_xy(others.as_slice());
        let highlighted_xy = to_xy(highlighted.as_slice());

        Plot::new(id)
            .height(CHART_HEIGHT + 40.0)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("연월")
            .y_axis_label(Metric::PricePerArea.label())
            .x_axis_formatter(|mark, _range| Self::period_tick(mark.value))
            .label_formatter(move |_name, value| {
                let nearest = hover.iter().min_by(|(a, _), (b, _)| {
                    let da = (a[0] - value.x).powi(2) + ((a[1] - value.y) / value.y.abs().max(1.0)).powi(2);
                    let db = (b[0] - value.x).powi(2) + ((b[1] - value.y) / value.y.abs().max(1.0)).powi(2);
                    da.total_cmp(&db)
                });
                match nearest {
                    Some((xy, text)) => format!(
                        "{}\n{}\n{}",
                        text,
                        Self::period_tick(xy[0]),
                        format_manwon(xy[1])
                    ),
                    None => String::new(),
                }
            })
            .show(ui, |plot_ui| {
                plot_ui.points(
                    Points::new(other_xy)
                        .radius(2.0)
                        .color(OTHER_COLOR)
                        .name(OTHER_LABEL),
                );
                plot_ui.points(
                    Points::new(highlighted_xy)
                        .radius(3.0)
                        .color(SELECTED_COLOR)
                        .name(SELECTED_LABEL),
                );
            });
    }

    /// Draw the regional means table.
    pub fn draw_region_means_table(ui: &mut egui::Ui, id: &str, means: &[RegionMean]) {
        if means.is_empty() {
            Self::draw_empty(ui);
            return;
        }

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt(format!("{}_scroll", id))
                    .max_height(320.0)
                    .show(ui, |ui| {
                        egui::Grid::new(ui.make_persistent_id(id))
                            .striped(true)
                            .min_col_width(70.0)
                            .spacing([12.0, 4.0])
                            .show(ui, |ui| {
                                for header in ["지역", "거래 수", "평균 거래금액", "평균 평당가격", "평당가 표준편차"] {
                                    ui.label(RichText::new(header).strong().size(11.0));
                                }
                                ui.end_row();

                                for m in means {
                                    ui.label(RichText::new(&m.label).size(11.0));
                                    ui.label(RichText::new(group_thousands(m.count as i64)).size(11.0));
                                    ui.label(RichText::new(format_manwon(m.mean_price)).size(11.0));
                                    ui.label(
                                        RichText::new(format_manwon(m.mean_price_per_area)).size(11.0),
                                    );
                                    let spread = m
                                        .std_price_per_area
                                        .map(format_manwon)
                                        .unwrap_or_else(|| "-".to_string());
                                    ui.label(RichText::new(spread).size(11.0));
                                    ui.end_row();
                                }
                            });
                    });
            });
    }

    /// Draw one side (max or min) of the monthly extremes.
    pub fn draw_extremes_table(
        ui: &mut egui::Ui,
        id: &str,
        extremes: &[PeriodExtremes<TransactionRecord>],
        metric: Metric,
        highest: bool,
    ) {
        if extremes.is_empty() {
            Self::draw_empty(ui);
            return;
        }

        let accent = if highest {
            SELECTED_COLOR
        } else {
            PALETTE[0]
        };

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt(format!("{}_scroll", id))
                    .max_height(320.0)
                    .show(ui, |ui| {
                        egui::Grid::new(ui.make_persistent_id(id))
                            .striped(true)
                            .min_col_width(60.0)
                            .spacing([10.0, 4.0])
                            .show(ui, |ui| {
                                for header in ["거래월", "단지명", "계약일", "전용면적", "거래금액", "법정동", metric.label()] {
                                    ui.label(RichText::new(header).strong().size(11.0));
                                }
                                ui.end_row();

                                for row in extremes {
                                    let record = if highest { &row.max } else { &row.min };
                                    ui.label(RichText::new(row.period.to_string()).size(11.0));
                                    ui.label(
                                        RichText::new(&record.complex_name).size(11.0).color(accent),
                                    );
                                    ui.label(
                                        RichText::new(record.contract_date.format("%Y-%m-%d").to_string())
                                            .size(11.0),
                                    );
                                    ui.label(RichText::new(format_area(record.floor_area_sqm)).size(11.0));
                                    ui.label(
                                        RichText::new(format_manwon(record.deal_amount as f64)).size(11.0),
                                    );
                                    ui.label(RichText::new(&record.neighborhood).size(11.0));
                                    ui.label(RichText::new(format_manwon(record.metric(metric))).size(11.0));
                                    ui.end_row();
                                }
                            });
                    });
            });
    }

    fn draw_empty(ui: &mut egui::Ui) {
        ui.label(
            RichText::new("선택한 조건에 해당하는 데이터가 없습니다.")
                .size(12.0)
                .color(Color32::GRAY),
        );
    }
}
