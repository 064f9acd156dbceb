//! Data module - CSV loading, normalization and selection

mod loader;
mod processor;
mod record;
mod schema;

pub use loader::{DataLoader, Dataset};
pub use processor::{DataProcessor, ProcessorError, RegionFilter, RegionKey, YearRange};
pub use record::{
    region_label, AggregatedRecord, Metric, Period, PriceObservation, RawTransaction,
    TransactionRecord,
};
pub use schema::{DetailColumns, SummaryColumns};
