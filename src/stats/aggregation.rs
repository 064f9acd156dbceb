//! Aggregation Engine Module
//! Regional means, per-month extremal records and labelled trend series.
//!
//! Every query takes a slice of observations and returns a new collection.
//! Empty input, or a filter that matches nothing, yields an empty result.

use crate::data::{
    region_label, AggregatedRecord, Metric, Period, PriceObservation, RegionFilter,
    TransactionRecord,
};
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Label for records matching the selection in a two-way partition.
pub const SELECTED_LABEL: &str = "선택";
/// Catch-all label for records matching no filter.
pub const OTHER_LABEL: &str = "기타";
/// Label of the unconditional city-wide series.
pub const CITYWIDE_LABEL: &str = "서울 전체";

/// Key granularity for regional means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    District,
    Neighborhood,
}

/// Output ordering for regional means. Ties are broken by group key ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionOrder {
    #[default]
    PricePerAreaDesc,
    PriceDesc,
    KeyAsc,
}

/// Mean prices of one region group.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMean {
    pub district: String,
    /// `None` at district granularity.
    pub neighborhood: Option<String>,
    pub label: String,
    pub count: usize,
    pub mean_price: f64,
    pub mean_price_per_area: f64,
    /// Sample standard deviation of price per area; `None` below two records.
    pub std_price_per_area: Option<f64>,
}

/// The highest and lowest record of one month for a given metric.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodExtremes<T> {
    pub period: Period,
    pub max: T,
    pub min: T,
}

impl<T: Clone> PeriodExtremes<&T> {
    pub fn cloned(&self) -> PeriodExtremes<T> {
        PeriodExtremes {
            period: self.period,
            max: self.max.clone(),
            min: self.min.clone(),
        }
    }
}

/// Mean of a metric for one label within one month.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub period: Period,
    pub label: String,
    pub mean: f64,
    pub count: usize,
}

/// Stateless query functions over normalized records.
pub struct AggregationEngine;

impl AggregationEngine {
    /// Group by district or district+neighborhood and average price and
    /// price per area.
    pub fn means_by_region<T: PriceObservation>(
        records: &[T],
        granularity: Granularity,
        order: RegionOrder,
    ) -> Vec<RegionMean> {
        let mut groups: BTreeMap<(String, Option<String>), (Vec<f64>, Vec<f64>)> =
            BTreeMap::new();

        for record in records {
            let key = match granularity {
                Granularity::District => (record.district().to_string(), None),
                Granularity::Neighborhood => (
                    record.district().to_string(),
                    Some(record.neighborhood().to_string()),
                ),
            };
            let (prices, per_area) = groups.entry(key).or_default();
            prices.push(record.metric(Metric::DealAmount));
            per_area.push(record.metric(Metric::PricePerArea));
        }

        let mut means: Vec<RegionMean> = groups
            .into_iter()
            .map(|((district, neighborhood), (prices, per_area))| {
                let label = match &neighborhood {
                    Some(n) => region_label(&district, n),
                    None => district.clone(),
                };
                let std_price_per_area = if per_area.len() > 1 {
                    Some(per_area.iter().std_dev())
                } else {
                    None
                };
                RegionMean {
                    count: prices.len(),
                    mean_price: prices.iter().mean(),
                    mean_price_per_area: per_area.iter().mean(),
                    std_price_per_area,
                    district,
                    neighborhood,
                    label,
                }
            })
            .collect();

        // Groups come out of the BTreeMap in key order, so a stable sort
        // keeps ties in ascending key order.
        match order {
            RegionOrder::PricePerAreaDesc => means.sort_by(|a, b| {
                b.mean_price_per_area.total_cmp(&a.mean_price_per_area)
            }),
            RegionOrder::PriceDesc => means.sort_by(|a, b| b.mean_price.total_cmp(&a.mean_price)),
            RegionOrder::KeyAsc => {}
        }

        means
    }

    /// Per calendar month, the records with the highest and lowest `metric`.
    ///
    /// When several records share the extreme value, the first one in input
    /// order is selected. Months without records are omitted; output is
    /// ascending by period.
    pub fn extremal_by_period<T: PriceObservation + Clone>(
        records: &[T],
        metric: Metric,
    ) -> Vec<PeriodExtremes<T>> {
        // (max index, min index) per month
        let mut buckets: BTreeMap<Period, (usize, usize)> = BTreeMap::new();

        for (idx, record) in records.iter().enumerate() {
            let value = record.metric(metric);
            match buckets.entry(record.period()) {
                Entry::Vacant(slot) => {
                    slot.insert((idx, idx));
                }
                Entry::Occupied(mut slot) => {
                    let (max_idx, min_idx) = slot.get_mut();
                    // Strict comparisons keep the earliest record on ties
                    if value.total_cmp(&records[*max_idx].metric(metric)) == Ordering::Greater {
                        *max_idx = idx;
                    }
                    if value.total_cmp(&records[*min_idx].metric(metric)) == Ordering::Less {
                        *min_idx = idx;
                    }
                }
            }
        }

        buckets
            .into_iter()
            .map(|(period, (max_idx, min_idx))| PeriodExtremes {
                period,
                max: records[max_idx].clone(),
                min: records[min_idx].clone(),
            })
            .collect()
    }

    /// `extremal_by_period` for several metrics at once.
    pub fn extremal_by_period_multi<T: PriceObservation + Clone>(
        records: &[T],
        metrics: &[Metric],
    ) -> Vec<(Metric, Vec<PeriodExtremes<T>>)> {
        metrics
            .iter()
            .map(|&metric| (metric, Self::extremal_by_period(records, metric)))
            .collect()
    }

    /// Per-month means of `metric` for records matching `filter` ("선택")
    /// versus all others ("기타").
    pub fn trend_series<T: PriceObservation>(
        records: &[T],
        filter: &RegionFilter,
        metric: Metric,
    ) -> Vec<TrendPoint> {
        if !records.iter().any(|r| filter.matches(r)) {
            return Vec::new();
        }

        Self::trend_by(records, metric, |r| {
            if filter.matches(r) {
                SELECTED_LABEL.to_string()
            } else {
                OTHER_LABEL.to_string()
            }
        })
    }

    /// N-way variant of `trend_series`.
    ///
    /// Each record takes the label of the first partition whose filter it
    /// matches, or "기타" when none does. With `include_citywide`, a
    /// "서울 전체" series over all records is appended.
    pub fn trend_partitioned<T: PriceObservation>(
        records: &[T],
        partitions: &[(String, RegionFilter)],
        metric: Metric,
        include_citywide: bool,
    ) -> Vec<TrendPoint> {
        let any_match = records
            .iter()
            .any(|r| partitions.iter().any(|(_, filter)| filter.matches(r)));
        if !any_match {
            return Vec::new();
        }

        let mut points = Self::trend_by(records, metric, |r| {
            partitions
                .iter()
                .find(|(_, filter)| filter.matches(r))
                .map_or_else(|| OTHER_LABEL.to_string(), |(label, _)| label.clone())
        });

        if include_citywide {
            points.extend(Self::trend_by(records, metric, |_| CITYWIDE_LABEL.to_string()));
            points.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.label.cmp(&b.label)));
        }

        points
    }

    /// One series per region label, e.g. for per-neighborhood trend lines.
    pub fn trend_by_region<T: PriceObservation>(records: &[T], metric: Metric) -> Vec<TrendPoint> {
        Self::trend_by(records, metric, |r| r.region_label().to_string())
    }

    /// Per-(period, label) means, ordered by period then label.
    pub fn trend_by<T, F>(records: &[T], metric: Metric, label_of: F) -> Vec<TrendPoint>
    where
        T: PriceObservation,
        F: Fn(&T) -> String,
    {
        let mut buckets: BTreeMap<(Period, String), Vec<f64>> = BTreeMap::new();
        for record in records {
            buckets
                .entry((record.period(), label_of(record)))
                .or_default()
                .push(record.metric(metric));
        }

        buckets
            .into_iter()
            .map(|((period, label), values)| TrendPoint {
                period,
                label,
                count: values.len(),
                mean: values.iter().mean(),
            })
            .collect()
    }

    /// Monthly means per neighborhood, the on-the-fly equivalent of the
    /// summary source.
    pub fn monthly_summary(records: &[TransactionRecord]) -> Vec<AggregatedRecord> {
        let mut groups: BTreeMap<(&str, &str, Period), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for record in records {
            let (prices, per_area) = groups
                .entry((record.district.as_str(), record.neighborhood.as_str(), record.period))
                .or_default();
            prices.push(record.deal_amount as f64);
            per_area.push(record.price_per_area);
        }

        groups
            .into_iter()
            .map(|((district, neighborhood, period), (prices, per_area))| {
                AggregatedRecord::new(
                    district,
                    neighborhood,
                    period,
                    prices.iter().mean(),
                    per_area.iter().mean(),
                    prices.len(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::data::{DataLoader, DataProcessor, RawTransaction, RegionKey};
    use approx::assert_relative_eq;
    use std::path::Path;

    fn tx(
        district: &str,
        neighborhood: &str,
        complex: &str,
        period: &str,
        amount: &str,
        area: &str,
    ) -> TransactionRecord {
        TransactionRecord::parse(&RawTransaction {
            district: Some(district),
            neighborhood: Some(neighborhood),
            complex_name: Some(complex),
            floor_area: Some(area),
            contract_period: Some(period),
            deal_amount: Some(amount),
        })
        .unwrap()
    }

    fn month(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn test_district_means_match_hand_computed() {
        let records = vec![
            tx("A", "x", "c1", "202401", "100", "1"),
            tx("A", "y", "c2", "202401", "200", "2"),
            tx("A", "x", "c3", "202402", "300", "3"),
        ];

        let means =
            AggregationEngine::means_by_region(&records, Granularity::District, RegionOrder::default());
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].label, "A");
        assert_eq!(means[0].neighborhood, None);
        assert_eq!(means[0].count, 3);
        assert_relative_eq!(means[0].mean_price, 200.0);
        assert_relative_eq!(means[0].mean_price_per_area, 100.0);
        assert_relative_eq!(means[0].std_price_per_area.unwrap(), 0.0);
    }

    #[test]
    fn test_means_ordering_and_tie_break() {
        let records = vec![
            tx("C", "z", "c", "202401", "300", "1"),
            tx("B", "z", "b", "202401", "500", "1"),
            tx("A", "z", "a", "202401", "500", "1"),
        ];

        let by_ppa = AggregationEngine::means_by_region(
            &records,
            Granularity::District,
            RegionOrder::PricePerAreaDesc,
        );
        let labels: Vec<_> = by_ppa.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);

        let by_key =
            AggregationEngine::means_by_region(&records, Granularity::District, RegionOrder::KeyAsc);
        assert_eq!(by_key[2].label, "C");
        assert_eq!(by_key[0].std_price_per_area, None);
    }

    #[test]
    fn test_neighborhood_granularity() {
        let records = vec![
            tx("A", "x", "c1", "202401", "100", "1"),
            tx("A", "y", "c2", "202401", "300", "1"),
            tx("A", "x", "c3", "202401", "200", "1"),
        ];
        let means = AggregationEngine::means_by_region(
            &records,
            Granularity::Neighborhood,
            RegionOrder::PriceDesc,
        );
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].label, "A y");
        assert_relative_eq!(means[1].mean_price, 150.0);
    }

    #[test]
    fn test_extremal_selects_max_and_min() {
        let records = vec![
            tx("A", "x", "low", "202401", "100", "1"),
            tx("A", "x", "high", "202401", "500", "1"),
            tx("A", "x", "mid", "202401", "300", "1"),
        ];
        let extremes = AggregationEngine::extremal_by_period(&records, Metric::DealAmount);
        assert_eq!(extremes.len(), 1);
        assert_eq!(extremes[0].max.complex_name, "high");
        assert_eq!(extremes[0].min.complex_name, "low");

        let mut reversed = records.clone();
        reversed.reverse();
        let extremes = AggregationEngine::extremal_by_period(&reversed, Metric::DealAmount);
        assert_eq!(extremes[0].max.complex_name, "high");
        assert_eq!(extremes[0].min.complex_name, "low");
    }

    #[test]
    fn test_extremal_ties_pick_first_in_input_order() {
        let records = vec![
            tx("A", "x", "first", "202401", "500", "1"),
            tx("A", "x", "cheap-1", "202401", "100", "1"),
            tx("A", "x", "second", "202401", "500", "1"),
            tx("A", "x", "cheap-2", "202401", "100", "1"),
        ];
        let extremes = AggregationEngine::extremal_by_period(&records, Metric::DealAmount);
        assert_eq!(extremes[0].max.complex_name, "first");
        assert_eq!(extremes[0].min.complex_name, "cheap-1");
    }

    #[test]
    fn test_extremal_orders_periods_and_skips_empty_months() {
        let records = vec![
            tx("A", "x", "mar", "202403", "100", "1"),
            tx("A", "x", "jan", "202401", "100", "1"),
        ];
        let extremes = AggregationEngine::extremal_by_period(&records, Metric::PricePerArea);
        let periods: Vec<_> = extremes.iter().map(|e| e.period).collect();
        assert_eq!(periods, vec![month(2024, 1), month(2024, 3)]);
    }

    #[test]
    fn test_extremal_multi_and_borrowed_records() {
        let records = vec![
            tx("A", "x", "big", "202401", "1000", "100"),
            tx("A", "x", "small", "202401", "600", "20"),
        ];
        let borrowed: Vec<&TransactionRecord> = records.iter().collect();
        let results = AggregationEngine::extremal_by_period_multi(&borrowed, &Metric::ALL);

        assert_eq!(results[0].0, Metric::DealAmount);
        assert_eq!(results[0].1[0].max.complex_name, "big");
        assert_eq!(results[1].0, Metric::PricePerArea);
        assert_eq!(results[1].1[0].max.complex_name, "small");
        assert_eq!(results[1].1[0].cloned().min.complex_name, "big");
    }

    #[test]
    fn test_trend_series_partitions_every_record() {
        let records = vec![
            tx("A", "x", "a1", "202401", "100", "1"),
            tx("A", "y", "a2", "202401", "300", "1"),
            tx("B", "x", "b1", "202401", "1000", "1"),
            tx("B", "x", "b2", "202402", "2000", "1"),
            tx("A", "x", "a3", "202402", "500", "1"),
        ];
        let filter = RegionFilter::new(vec![RegionKey::district("A")]);
        let points = AggregationEngine::trend_series(&records, &filter, Metric::DealAmount);

        let total: usize = points.iter().map(|p| p.count).sum();
        assert_eq!(total, records.len());

        let jan_selected = points
            .iter()
            .find(|p| p.period == month(2024, 1) && p.label == SELECTED_LABEL)
            .unwrap();
        assert_relative_eq!(jan_selected.mean, 200.0);
        assert_eq!(jan_selected.count, 2);

        assert!(points.windows(2).all(|w| w[0].period <= w[1].period));
    }

    #[test]
    fn test_trend_partitioned_with_citywide() {
        let records = vec![
            tx("A", "x", "a", "202401", "100", "1"),
            tx("B", "x", "b", "202401", "200", "1"),
            tx("C", "x", "c", "202401", "600", "1"),
        ];
        let partitions = vec![
            ("A".to_string(), RegionFilter::new(vec![RegionKey::district("A")])),
            ("B".to_string(), RegionFilter::new(vec![RegionKey::district("B")])),
        ];
        let points =
            AggregationEngine::trend_partitioned(&records, &partitions, Metric::DealAmount, true);

        let labels: Vec<_> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", OTHER_LABEL, CITYWIDE_LABEL]);

        let partitioned: usize = points
            .iter()
            .filter(|p| p.label != CITYWIDE_LABEL)
            .map(|p| p.count)
            .sum();
        assert_eq!(partitioned, records.len());

        let citywide = points.iter().find(|p| p.label == CITYWIDE_LABEL).unwrap();
        assert_relative_eq!(citywide.mean, 300.0);
    }

    #[test]
    fn test_first_matching_partition_wins() {
        let records = vec![tx("A", "x", "a", "202401", "100", "1")];
        let partitions = vec![
            ("neighborhood".to_string(), RegionFilter::new(vec![RegionKey::neighborhood("A", "x")])),
            ("district".to_string(), RegionFilter::new(vec![RegionKey::district("A")])),
        ];
        let points =
            AggregationEngine::trend_partitioned(&records, &partitions, Metric::DealAmount, false);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].label, "neighborhood");
    }

    #[test]
    fn test_unknown_region_yields_empty_for_every_query() {
        let records = vec![
            tx("A", "x", "a", "202401", "100", "1"),
            tx("B", "y", "b", "202402", "200", "1"),
        ];
        let unknown = RegionFilter::new(vec![RegionKey::neighborhood("A", "nowhere")]);
        let selected = DataProcessor::filter(&records, &unknown, None);

        assert!(AggregationEngine::means_by_region(
            &selected,
            Granularity::District,
            RegionOrder::default()
        )
        .is_empty());
        assert!(AggregationEngine::extremal_by_period(&selected, Metric::DealAmount).is_empty());
        assert!(AggregationEngine::trend_series(&records, &unknown, Metric::DealAmount).is_empty());
        assert!(AggregationEngine::trend_partitioned(
            &records,
            &[("x".to_string(), unknown.clone())],
            Metric::DealAmount,
            true
        )
        .is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let empty: Vec<TransactionRecord> = Vec::new();
        let filter = RegionFilter::new(vec![RegionKey::district("A")]);
        assert!(
            AggregationEngine::means_by_region(&empty, Granularity::Neighborhood, RegionOrder::KeyAsc)
                .is_empty()
        );
        assert!(AggregationEngine::extremal_by_period(&empty, Metric::PricePerArea).is_empty());
        assert!(AggregationEngine::trend_series(&empty, &filter, Metric::PricePerArea).is_empty());
        assert!(AggregationEngine::trend_by_region(&empty, Metric::PricePerArea).is_empty());
        assert!(AggregationEngine::monthly_summary(&empty).is_empty());
    }

    #[test]
    fn test_trend_by_region_over_summary_rows() {
        let rows = vec![
            AggregatedRecord::new("A", "x", month(2024, 1), 100.0, 10.0, 0),
            AggregatedRecord::new("A", "y", month(2024, 1), 300.0, 30.0, 0),
            AggregatedRecord::new("A", "x", month(2024, 2), 200.0, 20.0, 0),
        ];
        let points = AggregationEngine::trend_by_region(&rows, Metric::PricePerArea);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].label, "A x");
        assert_eq!(points[1].label, "A y");
        assert_relative_eq!(points[2].mean, 20.0);
    }

    #[test]
    fn test_monthly_summary_groups_by_region_and_month() {
        let records = vec![
            tx("A", "x", "a", "202401", "100", "1"),
            tx("A", "x", "b", "202401", "300", "3"),
            tx("A", "x", "c", "202402", "50", "1"),
        ];
        let summary = AggregationEngine::monthly_summary(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].count, 2);
        assert_relative_eq!(summary[0].mean_price, 200.0);
        assert_relative_eq!(summary[0].mean_price_per_area, 100.0);
    }

    #[test]
    fn test_malformed_rows_do_not_affect_aggregates() {
        let clean = polars::df!(
            "자치구" => ["A", "A"],
            "법정동" => ["x", "x"],
            "단지명" => ["a", "b"],
            "전용면적" => ["1", "1"],
            "거래금액" => ["100", "300"],
            "계약년월" => ["202401", "202401"]
        )
        .unwrap();
        let dirty = polars::df!(
            "자치구" => ["A", "A", "A", "A"],
            "법정동" => ["x", "x", "x", "x"],
            "단지명" => ["a", "zero-area", "b", "bad-date"],
            "전용면적" => ["1", "0", "1", "1"],
            "거래금액" => ["100", "9,999", "300", "1"],
            "계약년월" => ["202401", "202401", "202401", "2024-99"]
        )
        .unwrap();

        let config = LoaderConfig::default();
        let clean = DataLoader::build_dataset(&clean, None, &config).unwrap();
        let dirty = DataLoader::build_dataset(&dirty, None, &config).unwrap();

        let clean_means =
            AggregationEngine::means_by_region(clean.detail(), Granularity::District, RegionOrder::KeyAsc);
        let dirty_means =
            AggregationEngine::means_by_region(dirty.detail(), Granularity::District, RegionOrder::KeyAsc);
        assert_eq!(clean_means, dirty_means);
        assert_eq!(dirty_means[0].count, 2);

        let extremes = AggregationEngine::extremal_by_period(dirty.detail(), Metric::DealAmount);
        assert_eq!(extremes[0].max.complex_name, "b");
        assert_eq!(dirty.report().dropped_rows(), 2);
    }

    #[test]
    fn test_end_to_end_fixture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/detail_small.csv");
        let detail = DataLoader::read_csv(&path).unwrap();
        let dataset = DataLoader::build_dataset(&detail, None, &LoaderConfig::default()).unwrap();
        assert_eq!(dataset.detail().len(), 5);

        let means = AggregationEngine::means_by_region(
            dataset.detail(),
            Granularity::District,
            RegionOrder::KeyAsc,
        );
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].label, "강남구");
        assert_relative_eq!(means[0].mean_price, 150_000.0);
        assert_eq!(means[1].label, "서초구");
        assert_relative_eq!(means[1].mean_price, 275_000.0);
        assert_relative_eq!(means[1].mean_price_per_area, (300_000.0 / 84.0 + 2_500.0) / 2.0);

        let extremes = AggregationEngine::extremal_by_period(dataset.detail(), Metric::DealAmount);
        assert_eq!(extremes.len(), 2);
        assert_eq!(extremes[0].period, month(2024, 1));
        assert_eq!(extremes[0].max.complex_name, "아크로");
        assert_eq!(extremes[0].min.complex_name, "아이파크");
        assert_eq!(extremes[1].period, month(2024, 2));
        assert_eq!(extremes[1].max.complex_name, "래미안원베일리");
        assert_eq!(extremes[1].min.complex_name, "자이");
    }
}
