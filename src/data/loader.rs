//! CSV Data Loader Module
//! Loads the detail and summary sources with Polars and normalizes them into
//! an immutable dataset of canonical records.

use crate::config::{LoaderConfig, SourcePaths};
use crate::data::record::{AggregatedRecord, RawTransaction, RowError, TransactionRecord};
use crate::data::schema::SchemaError;
use crate::stats::AggregationEngine;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to read source {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("No data loaded")]
    NoData,
}

/// Row accounting for one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub detail_rows: usize,
    pub parse_failures: usize,
    pub division_failures: usize,
    pub summary_rows: usize,
    pub summary_failures: usize,
    pub max_drop_fraction: f64,
}

impl LoadReport {
    pub fn dropped_rows(&self) -> usize {
        self.parse_failures + self.division_failures + self.summary_failures
    }

    pub fn total_rows(&self) -> usize {
        self.detail_rows + self.summary_rows
    }

    pub fn drop_fraction(&self) -> f64 {
        if self.total_rows() == 0 {
            0.0
        } else {
            self.dropped_rows() as f64 / self.total_rows() as f64
        }
    }

    /// Message for the UI when too many rows were dropped.
    pub fn warning(&self) -> Option<String> {
        (self.drop_fraction() > self.max_drop_fraction).then(|| {
            format!(
                "{} of {} rows dropped ({:.1}%): {} unparseable, {} non-positive area, {} bad summary rows",
                self.dropped_rows(),
                self.total_rows(),
                self.drop_fraction() * 100.0,
                self.parse_failures,
                self.division_failures,
                self.summary_failures,
            )
        })
    }

    fn record(&mut self, error: &RowError) {
        match error {
            RowError::Parse { .. } => self.parse_failures += 1,
            RowError::Division { .. } => self.division_failures += 1,
        }
    }
}

/// Normalized, read-only record set produced by one load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    detail: Vec<TransactionRecord>,
    summary: Vec<AggregatedRecord>,
    summary_computed: bool,
    report: LoadReport,
}

impl Dataset {
    pub fn detail(&self) -> &[TransactionRecord] {
        &self.detail
    }

    pub fn summary(&self) -> &[AggregatedRecord] {
        &self.summary
    }

    /// True when no summary source was given and the summary was derived.
    pub fn summary_is_computed(&self) -> bool {
        self.summary_computed
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

/// Identity of the sources on disk; a change triggers a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint {
    entries: Vec<(PathBuf, u64, Option<SystemTime>)>,
}

impl SourceFingerprint {
    pub fn of(sources: &SourcePaths) -> Result<Self, LoaderError> {
        let entries = std::iter::once(&sources.detail)
            .chain(sources.summary.as_ref())
            .map(|path| {
                let io_err = |source| LoaderError::Io {
                    path: path.clone(),
                    source,
                };
                let canonical = path.canonicalize().map_err(io_err)?;
                let meta = std::fs::metadata(&canonical).map_err(io_err)?;
                Ok((canonical, meta.len(), meta.modified().ok()))
            })
            .collect::<Result<Vec<_>, LoaderError>>()?;
        Ok(Self { entries })
    }
}

/// Handles CSV loading with Polars and memoizes the last loaded dataset.
pub struct DataLoader {
    config: LoaderConfig,
    cached: Option<(SourceFingerprint, Arc<Dataset>)>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl DataLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    /// Load both sources, reusing the cached dataset while they are unchanged.
    ///
    /// A summary path that does not exist is treated as absent, so the
    /// summary is computed from the detail rows.
    pub fn load(&mut self, sources: &SourcePaths) -> Result<Arc<Dataset>, LoaderError> {
        let sources = &Self::present_sources(sources);
        let fingerprint = SourceFingerprint::of(sources)?;
        if let Some((cached, dataset)) = &self.cached {
            if *cached == fingerprint {
                debug!(detail = %sources.detail.display(), "sources unchanged, reusing dataset");
                return Ok(Arc::clone(dataset));
            }
        }

        let detail = Self::read_csv(&sources.detail)?;
        let summary = sources
            .summary
            .as_deref()
            .map(Self::read_csv)
            .transpose()?;

        let dataset = Arc::new(Self::build_dataset(&detail, summary.as_ref(), &self.config)?);
        self.cached = Some((fingerprint, Arc::clone(&dataset)));
        Ok(dataset)
    }

    fn present_sources(sources: &SourcePaths) -> SourcePaths {
        match &sources.summary {
            Some(path) if !path.exists() => {
                warn!(
                    summary = %path.display(),
                    "summary source not found, computing from detail rows"
                );
                SourcePaths {
                    detail: sources.detail.clone(),
                    summary: None,
                }
            }
            _ => sources.clone(),
        }
    }

    /// Drop the cached dataset.
    pub fn clear(&mut self) {
        self.cached = None;
    }

    /// Get the currently cached dataset.
    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.cached.as_ref().map(|(_, dataset)| Arc::clone(dataset))
    }

    /// Read a CSV file with every column kept as text.
    pub fn read_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        // Schema inference is disabled: amounts like "1,234" and tokens like
        // "202401" must reach the parsers untouched.
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;
        Ok(df)
    }

    /// Normalize already-read frames into a dataset.
    pub fn build_dataset(
        detail: &DataFrame,
        summary: Option<&DataFrame>,
        config: &LoaderConfig,
    ) -> Result<Dataset, LoaderError> {
        if detail.height() == 0 {
            return Err(LoaderError::NoData);
        }

        let mut report = LoadReport {
            max_drop_fraction: config.max_drop_fraction,
            ..LoadReport::default()
        };

        let detail_records = Self::parse_detail(detail, config, &mut report)?;
        let (summary_records, summary_computed) = match summary {
            Some(df) => (Self::parse_summary(df, config, &mut report)?, false),
            None => (AggregationEngine::monthly_summary(&detail_records), true),
        };

        info!(
            detail = detail_records.len(),
            summary = summary_records.len(),
            dropped = report.dropped_rows(),
            summary_computed,
            "dataset loaded"
        );
        if let Some(message) = report.warning() {
            warn!("{}", message);
        }

        Ok(Dataset {
            detail: detail_records,
            summary: summary_records,
            summary_computed,
            report,
        })
    }

    fn parse_detail(
        df: &DataFrame,
        config: &LoaderConfig,
        report: &mut LoadReport,
    ) -> Result<Vec<TransactionRecord>, LoaderError> {
        let columns = config.detail_columns.resolve(&column_names(df))?;

        let district = text_cells(df, &columns.district)?;
        let neighborhood = text_cells(df, &columns.neighborhood)?;
        let complex_name = match &columns.complex_name {
            Some(name) => text_cells(df, name)?,
            None => vec![None; df.height()],
        };
        let floor_area = text_cells(df, &columns.floor_area)?;
        let contract_period = text_cells(df, &columns.contract_period)?;
        let deal_amount = text_cells(df, &columns.deal_amount)?;

        report.detail_rows = df.height();
        let mut records = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let raw = RawTransaction {
                district: district[i].as_deref(),
                neighborhood: neighborhood[i].as_deref(),
                complex_name: complex_name[i].as_deref(),
                floor_area: floor_area[i].as_deref(),
                contract_period: contract_period[i].as_deref(),
                deal_amount: deal_amount[i].as_deref(),
            };

            match TransactionRecord::parse(&raw) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(row = i + 1, error = %e, "dropping detail row");
                    report.record(&e);
                }
            }
        }

        Ok(records)
    }

    fn parse_summary(
        df: &DataFrame,
        config: &LoaderConfig,
        report: &mut LoadReport,
    ) -> Result<Vec<AggregatedRecord>, LoaderError> {
        let columns = config.summary_columns.resolve(&column_names(df))?;

        let district = text_cells(df, &columns.district)?;
        let neighborhood = text_cells(df, &columns.neighborhood)?;
        let period = text_cells(df, &columns.period)?;
        let mean_price = text_cells(df, &columns.mean_price)?;
        let mean_price_per_area = text_cells(df, &columns.mean_price_per_area)?;

        report.summary_rows = df.height();
        let mut records = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let parsed = AggregatedRecord::parse(
                district[i].as_deref(),
                neighborhood[i].as_deref(),
                period[i].as_deref(),
                mean_price[i].as_deref(),
                mean_price_per_area[i].as_deref(),
            );

            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(row = i + 1, error = %e, "dropping summary row");
                    report.summary_failures += 1;
                }
            }
        }

        Ok(records)
    }
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Extract a column as optional text cells, casting non-string columns.
fn text_cells(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::String)?;
    let cells = column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(cells)
}
