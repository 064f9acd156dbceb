//! Data Processor Module
//! Region/year selection over loaded records and conversion of query results
//! into Polars frames for export.

use crate::data::record::{region_label, Metric, PriceObservation, TransactionRecord};
use crate::stats::{PeriodExtremes, RegionMean, TrendPoint};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// A district, optionally narrowed to one neighborhood.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionKey {
    pub district: String,
    pub neighborhood: Option<String>,
}

impl RegionKey {
    pub fn district(district: &str) -> Self {
        Self {
            district: district.to_string(),
            neighborhood: None,
        }
    }

    pub fn neighborhood(district: &str, neighborhood: &str) -> Self {
        Self {
            district: district.to_string(),
            neighborhood: Some(neighborhood.to_string()),
        }
    }

    pub fn matches<T: PriceObservation>(&self, record: &T) -> bool {
        record.district() == self.district
            && self
                .neighborhood
                .as_deref()
                .map_or(true, |n| record.neighborhood() == n)
    }

    pub fn label(&self) -> String {
        match &self.neighborhood {
            Some(n) => region_label(&self.district, n),
            None => self.district.clone(),
        }
    }
}

/// A set of region keys; a record matches when any key matches.
///
/// An empty filter matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFilter {
    keys: Vec<RegionKey>,
}

impl RegionFilter {
    pub fn new(keys: Vec<RegionKey>) -> Self {
        Self { keys }
    }

    /// Build from independent district and neighborhood picks.
    ///
    /// A record matches when its district is picked and, if any
    /// neighborhoods are picked, its neighborhood is picked too.
    pub fn from_selection(districts: &[String], neighborhoods: &[String]) -> Self {
        let keys = if neighborhoods.is_empty() {
            districts.iter().map(|d| RegionKey::district(d)).collect()
        } else {
            districts
                .iter()
                .flat_map(|d| neighborhoods.iter().map(move |n| RegionKey::neighborhood(d, n)))
                .collect()
        };
        Self { keys }
    }

    pub fn keys(&self) -> &[RegionKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches<T: PriceObservation>(&self, record: &T) -> bool {
        self.keys.iter().any(|key| key.matches(record))
    }
}

/// Inclusive year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    pub fn new(from: i32, to: i32) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }
}

/// Handles selection and export transformations.
pub struct DataProcessor;

impl DataProcessor {
    /// Records inside the year range (all records when no range is given).
    pub fn within_years<T: PriceObservation>(records: &[T], years: Option<YearRange>) -> Vec<&T> {
        records
            .iter()
            .filter(|r| years.map_or(true, |range| range.contains(r.period().year)))
            .collect()
    }

    /// Records matching both the region filter and the year range.
    pub fn filter<'a, T: PriceObservation>(
        records: &'a [T],
        regions: &RegionFilter,
        years: Option<YearRange>,
    ) -> Vec<&'a T> {
        records
            .iter()
            .filter(|r| regions.matches(r))
            .filter(|r| years.map_or(true, |range| range.contains(r.period().year)))
            .collect()
    }

    /// Sorted unique districts.
    pub fn districts<T: PriceObservation>(records: &[T]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.district().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted unique neighborhoods, limited to `districts` when non-empty.
    pub fn neighborhoods<T: PriceObservation>(records: &[T], districts: &[String]) -> Vec<String> {
        records
            .iter()
            .filter(|r| districts.is_empty() || districts.iter().any(|d| d == r.district()))
            .map(|r| r.neighborhood().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted unique contract years.
    pub fn years<T: PriceObservation>(records: &[T]) -> Vec<i32> {
        records
            .iter()
            .map(|r| r.period().year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Regional means as a frame: [region, district, neighborhood, count, mean_price, mean_price_per_area].
    pub fn region_means_frame(means: &[RegionMean]) -> Result<DataFrame, ProcessorError> {
        let df = DataFrame::new(vec![
            Column::new(
                "region".into(),
                means.iter().map(|m| m.label.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "district".into(),
                means.iter().map(|m| m.district.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "neighborhood".into(),
                means
                    .iter()
                    .map(|m| m.neighborhood.clone())
                    .collect::<Vec<Option<String>>>(),
            ),
            Column::new(
                "count".into(),
                means.iter().map(|m| m.count as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                "mean_price".into(),
                means.iter().map(|m| m.mean_price).collect::<Vec<_>>(),
            ),
            Column::new(
                "mean_price_per_area".into(),
                means.iter().map(|m| m.mean_price_per_area).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// Monthly extremes as a frame with one row per period and side.
    pub fn extremes_frame(
        extremes: &[PeriodExtremes<TransactionRecord>],
        metric: Metric,
    ) -> Result<DataFrame, ProcessorError> {
        let mut periods: Vec<String> = Vec::new();
        let mut sides: Vec<&str> = Vec::new();
        let mut complexes: Vec<String> = Vec::new();
        let mut dates: Vec<String> = Vec::new();
        let mut neighborhoods: Vec<String> = Vec::new();
        let mut areas: Vec<f64> = Vec::new();
        let mut amounts: Vec<i64> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for row in extremes {
            for (side, record) in [("max", &row.max), ("min", &row.min)] {
                periods.push(row.period.to_string());
                sides.push(side);
                complexes.push(record.complex_name.clone());
                dates.push(record.contract_date.to_string());
                neighborhoods.push(record.neighborhood.clone());
                areas.push(record.floor_area_sqm);
                amounts.push(record.deal_amount);
                values.push(record.metric(metric));
            }
        }

        let df = DataFrame::new(vec![
            Column::new("period".into(), periods),
            Column::new("side".into(), sides),
            Column::new("complex_name".into(), complexes),
            Column::new("contract_date".into(), dates),
            Column::new("neighborhood".into(), neighborhoods),
            Column::new("floor_area_sqm".into(), areas),
            Column::new("deal_amount".into(), amounts),
            Column::new("value".into(), values),
        ])?;
        Ok(df)
    }

    /// Trend points as a frame: [period, label, count, mean].
    pub fn trend_frame(points: &[TrendPoint]) -> Result<DataFrame, ProcessorError> {
        let df = DataFrame::new(vec![
            Column::new(
                "period".into(),
                points.iter().map(|p| p.period.to_string()).collect::<Vec<_>>(),
            ),
            Column::new(
                "label".into(),
                points.iter().map(|p| p.label.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "count".into(),
                points.iter().map(|p| p.count as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                "mean".into(),
                points.iter().map(|p| p.mean).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// Write a frame to a CSV file.
    pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ProcessorError> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{AggregatedRecord, Period};
    use crate::stats::{AggregationEngine, Granularity, RegionOrder};

    fn row(district: &str, neighborhood: &str, year: i32) -> AggregatedRecord {
        AggregatedRecord::new(
            district,
            neighborhood,
            Period::new(year, 1).unwrap(),
            100.0,
            10.0,
            1,
        )
    }

    fn rows() -> Vec<AggregatedRecord> {
        vec![
            row("강남구", "역삼동", 2023),
            row("강남구", "개포동", 2024),
            row("서초구", "반포동", 2024),
            row("서초구", "역삼동", 2025),
        ]
    }

    #[test]
    fn test_from_selection_is_cross_product() {
        let filter = RegionFilter::from_selection(
            &["강남구".to_string(), "서초구".to_string()],
            &["역삼동".to_string()],
        );
        assert_eq!(filter.keys().len(), 2);

        let data = rows();
        let matched = DataProcessor::filter(&data, &filter, None);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|r| r.neighborhood == "역삼동"));
    }

    #[test]
    fn test_district_only_selection() {
        let filter = RegionFilter::from_selection(&["강남구".to_string()], &[]);
        let data = rows();
        assert_eq!(DataProcessor::filter(&data, &filter, None).len(), 2);
        assert_eq!(
            DataProcessor::filter(&data, &filter, Some(YearRange::new(2024, 2024))).len(),
            1
        );
    }

    #[test]
    fn test_key_labels_match_record_labels() {
        let data = rows();
        let key = RegionKey::neighborhood("서초구", "반포동");
        assert_eq!(key.label(), data[2].region_label);
        assert_eq!(RegionKey::district("서초구").label(), "서초구");

        let means = AggregationEngine::means_by_region(
            &data,
            Granularity::Neighborhood,
            RegionOrder::KeyAsc,
        );
        assert!(means
            .iter()
            .all(|m| data.iter().any(|r| r.region_label == m.label)));
    }

    #[test]
    fn test_unknown_region_and_empty_filter_match_nothing() {
        let data = rows();
        let unknown = RegionFilter::new(vec![RegionKey::neighborhood("강남구", "반포동")]);
        assert!(DataProcessor::filter(&data, &unknown, None).is_empty());
        assert!(DataProcessor::filter(&data, &RegionFilter::default(), None).is_empty());
    }

    #[test]
    fn test_year_range_normalizes_bounds() {
        let range = YearRange::new(2025, 2023);
        assert_eq!(range, YearRange { from: 2023, to: 2025 });
        assert_eq!(DataProcessor::within_years(&rows(), Some(range)).len(), 4);
        assert_eq!(DataProcessor::within_years(&rows(), None).len(), 4);
    }

    #[test]
    fn test_enumerations_are_sorted_unique() {
        let data = rows();
        assert_eq!(DataProcessor::districts(&data), vec!["강남구", "서초구"]);
        assert_eq!(
            DataProcessor::neighborhoods(&data, &["서초구".to_string()]),
            vec!["반포동", "역삼동"]
        );
        assert_eq!(DataProcessor::neighborhoods(&data, &[]).len(), 3);
        assert_eq!(DataProcessor::years(&data), vec![2023, 2024, 2025]);
    }

    #[test]
    fn test_region_means_frame_shape() {
        let means = AggregationEngine::means_by_region(
            &rows(),
            Granularity::Neighborhood,
            RegionOrder::KeyAsc,
        );
        let df = DataProcessor::region_means_frame(&means).unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.width(), 6);
    }
}
