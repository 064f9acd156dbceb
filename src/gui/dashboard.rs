//! Dashboard View
//! Runs every query for one selection and holds the results for drawing.

use crate::charts::ScatterPoint;
use crate::data::{
    DataProcessor, Dataset, Metric, ProcessorError, RegionFilter, TransactionRecord,
};
use crate::gui::control_panel::UserSettings;
use crate::stats::{AggregationEngine, Granularity, PeriodExtremes, RegionMean, RegionOrder, TrendPoint};
use std::path::{Path, PathBuf};
use tracing::debug;

/// All derived collections rendered by the chart viewer.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub metric: Metric,
    pub granularity: Granularity,
    pub selected_districts: Vec<String>,
    pub has_selection: bool,
    /// Monthly mean price per selected region, from the summary table.
    pub region_price_trend: Vec<TrendPoint>,
    /// Monthly mean price per area per selected region, from the summary table.
    pub region_per_area_trend: Vec<TrendPoint>,
    /// District means of the summary table in the selected years.
    pub district_bars: Vec<RegionMean>,
    /// All selected regions pooled ("선택") vs. the rest ("기타").
    pub selection_trend: Vec<TrendPoint>,
    /// One series per selected region, the rest, and the city-wide average.
    pub comparison_trend: Vec<TrendPoint>,
    pub scatter: Vec<ScatterPoint>,
    pub region_means: Vec<RegionMean>,
    pub extremal_district: Option<String>,
    /// Monthly extremes in the extremal district, for every metric.
    pub extremes: Vec<(Metric, Vec<PeriodExtremes<TransactionRecord>>)>,
}

impl DashboardView {
    pub fn compute(dataset: &Dataset, settings: &UserSettings) -> Self {
        let regions = settings.region_filter();
        let years = settings.year_range();
        let metric = settings.metric;

        let summary_selected = DataProcessor::filter(dataset.summary(), &regions, years);
        let summary_in_years = DataProcessor::within_years(dataset.summary(), years);
        let detail_in_years = DataProcessor::within_years(dataset.detail(), years);

        // One comparison series per picked key
        let partitions: Vec<(String, RegionFilter)> = regions
            .keys()
            .iter()
            .map(|key| (key.label(), RegionFilter::new(vec![key.clone()])))
            .collect();

        let scatter = detail_in_years
            .iter()
            .map(|r| ScatterPoint {
                period: r.period,
                price_per_area: r.price_per_area,
                complex_name: r.complex_name.clone(),
                region_label: r.region_label.clone(),
                highlighted: regions.matches(r),
            })
            .collect();

        let extremes: Vec<(Metric, Vec<PeriodExtremes<TransactionRecord>>)> =
            match &settings.extremal_district {
                Some(district) => {
                    let in_district: Vec<&TransactionRecord> = detail_in_years
                        .iter()
                        .copied()
                        .filter(|r| &r.district == district)
                        .collect();
                    AggregationEngine::extremal_by_period_multi(&in_district, &Metric::ALL)
                        .into_iter()
                        .map(|(m, rows)| (m, rows.iter().map(PeriodExtremes::cloned).collect()))
                        .collect()
                }
                None => Vec::new(),
            };

        let view = Self {
            metric,
            granularity: settings.granularity,
            selected_districts: settings.districts.clone(),
            has_selection: !regions.is_empty(),
            region_price_trend: AggregationEngine::trend_by_region(
                &summary_selected,
                Metric::DealAmount,
            ),
            region_per_area_trend: AggregationEngine::trend_by_region(
                &summary_selected,
                Metric::PricePerArea,
            ),
            district_bars: AggregationEngine::means_by_region(
                &summary_in_years,
                Granularity::District,
                RegionOrder::KeyAsc,
            ),
            selection_trend: AggregationEngine::trend_series(&detail_in_years, &regions, metric),
            comparison_trend: AggregationEngine::trend_partitioned(
                &detail_in_years,
                &partitions,
                metric,
                true,
            ),
            scatter,
            region_means: AggregationEngine::means_by_region(
                &detail_in_years,
                settings.granularity,
                settings.region_order,
            ),
            extremal_district: settings.extremal_district.clone(),
            extremes,
        };

        debug!(
            detail = detail_in_years.len(),
            selected_summary = summary_selected.len(),
            comparison_points = view.comparison_trend.len(),
            "dashboard recomputed"
        );
        view
    }

    /// Extremes ranked by `metric`; empty when no district is picked.
    pub fn extremes_for(&self, metric: Metric) -> &[PeriodExtremes<TransactionRecord>] {
        self.extremes
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or_default()
    }

    /// Write the tables to CSV files in `dir`, returning the written paths.
    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>, ProcessorError> {
        let tables = [
            ("region_means.csv", DataProcessor::region_means_frame(&self.region_means)?),
            ("district_means.csv", DataProcessor::region_means_frame(&self.district_bars)?),
            (
                "monthly_extremes_deal_amount.csv",
                DataProcessor::extremes_frame(
                    self.extremes_for(Metric::DealAmount),
                    Metric::DealAmount,
                )?,
            ),
            (
                "monthly_extremes_price_per_area.csv",
                DataProcessor::extremes_frame(
                    self.extremes_for(Metric::PricePerArea),
                    Metric::PricePerArea,
                )?,
            ),
            ("selection_trend.csv", DataProcessor::trend_frame(&self.selection_trend)?),
            ("comparison_trend.csv", DataProcessor::trend_frame(&self.comparison_trend)?),
        ];

        let mut written = Vec::with_capacity(tables.len());
        for (name, mut df) in tables {
            let path = dir.join(name);
            DataProcessor::write_csv(&mut df, &path)?;
            written.push(path);
        }
        Ok(written)
    }
}
