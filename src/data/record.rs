//! Record Module
//! Canonical transaction/summary rows and the token parsers that build them.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use thiserror::Error;

/// Row-level failure. Rows that fail are dropped and counted, never coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Cannot parse {field} from {value:?}")]
    Parse { field: &'static str, value: String },
    #[error("Floor area must be positive, got {area}")]
    Division { area: f64 },
}

impl RowError {
    fn parse(field: &'static str, value: &str) -> Self {
        RowError::Parse {
            field,
            value: value.to_string(),
        }
    }
}

/// Calendar year-month bucket used for time-series grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Months since year 0, used as the x coordinate in charts.
    pub fn index(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    pub fn from_index(index: i64) -> Option<Self> {
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = index.rem_euclid(12) as u32 + 1;
        Self::new(year, month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Price field selectable for aggregation and extremal selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    DealAmount,
    #[default]
    PricePerArea,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::DealAmount, Metric::PricePerArea];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::DealAmount => "거래금액(만원)",
            Metric::PricePerArea => "평당가(만원)",
        }
    }
}

/// Anything that carries a region, a period and price values.
///
/// Implemented by detail transactions and summary rows so the aggregation
/// engine can serve both tables.
pub trait PriceObservation {
    fn district(&self) -> &str;
    fn neighborhood(&self) -> &str;
    fn region_label(&self) -> &str;
    fn period(&self) -> Period;
    fn metric(&self, metric: Metric) -> f64;
}

impl<T: PriceObservation + ?Sized> PriceObservation for &T {
    fn district(&self) -> &str {
        (**self).district()
    }

    fn neighborhood(&self) -> &str {
        (**self).neighborhood()
    }

    fn region_label(&self) -> &str {
        (**self).region_label()
    }

    fn period(&self) -> Period {
        (**self).period()
    }

    fn metric(&self, metric: Metric) -> f64 {
        (**self).metric(metric)
    }
}

/// Composite region key used for grouping lookups.
pub fn region_label(district: &str, neighborhood: &str) -> String {
    format!("{} {}", district, neighborhood)
}

/// Raw cells of one detail row as read from the source.
#[derive(Debug, Clone, Default)]
pub struct RawTransaction<'a> {
    pub district: Option<&'a str>,
    pub neighborhood: Option<&'a str>,
    pub complex_name: Option<&'a str>,
    pub floor_area: Option<&'a str>,
    pub contract_period: Option<&'a str>,
    pub deal_amount: Option<&'a str>,
}

/// One row of the detail dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub district: String,
    pub neighborhood: String,
    pub complex_name: String,
    pub floor_area_sqm: f64,
    pub contract_period: String,
    pub contract_date: NaiveDate,
    pub period: Period,
    pub deal_amount: i64,
    pub price_per_area: f64,
    pub region_label: String,
}

impl TransactionRecord {
    pub fn parse(raw: &RawTransaction<'_>) -> Result<Self, RowError> {
        let district = required_text("district", raw.district)?;
        let neighborhood = required_text("neighborhood", raw.neighborhood)?;
        let contract_period = raw.contract_period.unwrap_or_default().trim();
        let (contract_date, period) = parse_period(contract_period)?;
        let deal_amount = parse_amount(raw.deal_amount.unwrap_or_default())?;
        let floor_area_sqm = parse_decimal("floor_area", raw.floor_area.unwrap_or_default())?;
        let price_per_area = price_per_area(deal_amount, floor_area_sqm)?;

        Ok(Self {
            region_label: region_label(&district, &neighborhood),
            district,
            neighborhood,
            complex_name: raw.complex_name.unwrap_or_default().trim().to_string(),
            floor_area_sqm,
            contract_period: contract_period.to_string(),
            contract_date,
            period,
            deal_amount,
            price_per_area,
        })
    }
}

impl PriceObservation for TransactionRecord {
    fn district(&self) -> &str {
        &self.district
    }

    fn neighborhood(&self) -> &str {
        &self.neighborhood
    }

    fn region_label(&self) -> &str {
        &self.region_label
    }

    fn period(&self) -> Period {
        self.period
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::DealAmount => self.deal_amount as f64,
            Metric::PricePerArea => self.price_per_area,
        }
    }
}

/// One row of the summary dataset: monthly means per neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub district: String,
    pub neighborhood: String,
    pub period: Period,
    pub mean_price: f64,
    pub mean_price_per_area: f64,
    /// Number of transactions behind the means; 0 when read from a summary file.
    pub count: usize,
    pub region_label: String,
}

impl AggregatedRecord {
    pub fn new(
        district: &str,
        neighborhood: &str,
        period: Period,
        mean_price: f64,
        mean_price_per_area: f64,
        count: usize,
    ) -> Self {
        Self {
            district: district.to_string(),
            neighborhood: neighborhood.to_string(),
            period,
            mean_price,
            mean_price_per_area,
            count,
            region_label: region_label(district, neighborhood),
        }
    }

    /// Parse a summary row where the means were precomputed upstream.
    pub fn parse(
        district: Option<&str>,
        neighborhood: Option<&str>,
        period: Option<&str>,
        mean_price: Option<&str>,
        mean_price_per_area: Option<&str>,
    ) -> Result<Self, RowError> {
        let district = required_text("district", district)?;
        let neighborhood = required_text("neighborhood", neighborhood)?;
        let (_, period) = parse_period(period.unwrap_or_default())?;
        let mean_price = parse_decimal("mean_price", mean_price.unwrap_or_default())?;
        let mean_price_per_area =
            parse_decimal("mean_price_per_area", mean_price_per_area.unwrap_or_default())?;

        Ok(Self::new(
            &district,
            &neighborhood,
            period,
            mean_price,
            mean_price_per_area,
            0,
        ))
    }
}

impl PriceObservation for AggregatedRecord {
    fn district(&self) -> &str {
        &self.district
    }

    fn neighborhood(&self) -> &str {
        &self.neighborhood
    }

    fn region_label(&self) -> &str {
        &self.region_label
    }

    fn period(&self) -> Period {
        self.period
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::DealAmount => self.mean_price,
            Metric::PricePerArea => self.mean_price_per_area,
        }
    }
}

fn required_text(field: &'static str, value: Option<&str>) -> Result<String, RowError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        other => Err(RowError::parse(field, other.unwrap_or_default())),
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '.' | '/')
}

/// Parse a contract period token into its date and year-month bucket.
///
/// Accepts "2024년 01월", "2024년 01월 15일", "202401", "20240115",
/// "2024-01", "2024-01-15" and "2024-01-15 00:00:00". Tokens without a day
/// map to the first of the month.
pub fn parse_period(raw: &str) -> Result<(NaiveDate, Period), RowError> {
    let invalid = || RowError::parse("contract_period", raw);

    let token = raw.trim();
    let token = match token.split_once(' ') {
        Some((date, time)) if time.contains(':') => date,
        _ => token,
    };

    let cleaned: String = token
        .replace('년', "-")
        .replace('월', "-")
        .replace('일', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches('-');

    let parts: Vec<&str> = if cleaned.contains(is_separator) {
        cleaned.split(is_separator).collect()
    } else if cleaned.chars().all(|c| c.is_ascii_digit()) {
        match cleaned.len() {
            6 => vec![&cleaned[..4], &cleaned[4..6]],
            8 => vec![&cleaned[..4], &cleaned[4..6], &cleaned[6..8]],
            _ => return Err(invalid()),
        }
    } else {
        return Err(invalid());
    };

    let numeric = |part: &str, widths: std::ops::RangeInclusive<usize>| -> Option<u32> {
        if widths.contains(&part.len()) && part.chars().all(|c| c.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };

    let (year, month, day) = match parts.as_slice() {
        [y, m] => (numeric(*y, 4..=4), numeric(*m, 1..=2), Some(1)),
        [y, m, d] => (numeric(*y, 4..=4), numeric(*m, 1..=2), numeric(*d, 1..=2)),
        _ => return Err(invalid()),
    };

    let (Some(year), Some(month), Some(day)) = (year, month, day) else {
        return Err(invalid());
    };
    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)?;
    Ok((date, Period::from_date(date)))
}

/// Parse a deal amount in 만원 that may carry thousands separators.
pub fn parse_amount(raw: &str) -> Result<i64, RowError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(RowError::parse("deal_amount", raw));
    }

    if let Ok(amount) = cleaned.parse::<i64>() {
        return Ok(amount);
    }

    // Amounts exported as floats ("85000.0") are fine when integral
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v < i64::MAX as f64 => Ok(v as i64),
        _ => Err(RowError::parse("deal_amount", raw)),
    }
}

/// Parse a decimal cell, tolerating thousands separators.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, RowError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RowError::parse(field, raw)),
    }
}

/// Derive price per unit area, refusing non-positive areas.
pub fn price_per_area(deal_amount: i64, floor_area_sqm: f64) -> Result<f64, RowError> {
    if !(floor_area_sqm > 0.0) || !floor_area_sqm.is_finite() {
        return Err(RowError::Division {
            area: floor_area_sqm,
        });
    }
    Ok(deal_amount as f64 / floor_area_sqm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw<'a>(period: &'a str, amount: &'a str, area: &'a str) -> RawTransaction<'a> {
        RawTransaction {
            district: Some("강남구"),
            neighborhood: Some("역삼동"),
            complex_name: Some("래미안"),
            floor_area: Some(area),
            contract_period: Some(period),
            deal_amount: Some(amount),
        }
    }

    #[test]
    fn test_parse_period_korean_token() {
        let (date, period) = parse_period("2015년 01월").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(period, Period::new(2015, 1).unwrap());
    }

    #[test]
    fn test_parse_period_variants() {
        let expected = Period::new(2024, 3).unwrap();
        for token in [
            "202403",
            "2024-03",
            "2024-3",
            "2024.03",
            "2024/03/15",
            "20240315",
            "2024-03-15 00:00:00",
            "2024년 3월",
            "2024년 03월 15일",
        ] {
            let (_, period) = parse_period(token).unwrap();
            assert_eq!(period, expected, "token {token}");
        }

        let (date, _) = parse_period("20240315").unwrap();
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_parse_period_rejects_garbage() {
        for token in ["", "2024", "2024-13", "24-01", "2024년", "abcdef", "2024-02-30", "2024-01-01-01"] {
            assert!(
                matches!(parse_period(token), Err(RowError::Parse { .. })),
                "token {token:?} should fail"
            );
        }
    }

    #[test]
    fn test_parse_amount_with_separators() {
        assert_eq!(parse_amount("1,234,500").unwrap(), 1_234_500);
        assert_eq!(parse_amount(" 85,000 ").unwrap(), 85_000);
        assert_eq!(parse_amount("85000.0").unwrap(), 85_000);
        assert!(parse_amount("12a,000").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("100.5").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_sign_and_inner_spaces() {
        assert!(matches!(parse_amount("-5,000"), Err(RowError::Parse { .. })));
        assert!(matches!(parse_amount("+5,000"), Err(RowError::Parse { .. })));
        assert!(matches!(parse_amount("1 000"), Err(RowError::Parse { .. })));
        assert!(TransactionRecord::parse(&raw("202401", "-10,000", "50")).is_err());
    }

    #[test]
    fn test_price_per_area_is_derived() {
        let record = TransactionRecord::parse(&raw("202401", "10,000", "50")).unwrap();
        assert_relative_eq!(record.price_per_area, 200.0);
        assert_eq!(record.region_label, "강남구 역삼동");
        assert_eq!(record.deal_amount, 10_000);
    }

    #[test]
    fn test_non_positive_area_is_division_error() {
        for area in ["0", "-3.5"] {
            let err = TransactionRecord::parse(&raw("202401", "10,000", area)).unwrap_err();
            assert!(matches!(err, RowError::Division { .. }));
        }
    }

    #[test]
    fn test_missing_region_is_parse_error() {
        let mut row = raw("202401", "10,000", "50");
        row.neighborhood = Some("  ");
        let err = TransactionRecord::parse(&row).unwrap_err();
        assert_eq!(
            err,
            RowError::Parse {
                field: "neighborhood",
                value: String::new()
            }
        );
    }

    #[test]
    fn test_period_index_round_trip() {
        let period = Period::new(2023, 12).unwrap();
        assert_eq!(Period::from_index(period.index()), Some(period));
        assert_eq!(period.to_string(), "2023-12");
        assert!(Period::new(2023, 12) < Period::new(2024, 1));
    }

    #[test]
    fn test_summary_row_parse() {
        let row = AggregatedRecord::parse(
            Some("서초구"),
            Some("반포동"),
            Some("2015년 01월"),
            Some("120,000"),
            Some("1500.5"),
        )
        .unwrap();
        assert_eq!(row.period, Period::new(2015, 1).unwrap());
        assert_relative_eq!(row.metric(Metric::DealAmount), 120_000.0);
        assert_relative_eq!(row.metric(Metric::PricePerArea), 1500.5);
        assert_eq!(row.count, 0);
    }
}
