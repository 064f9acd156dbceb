//! Stats module - Region/period aggregation

mod aggregation;

pub use aggregation::{
    AggregationEngine, Granularity, PeriodExtremes, RegionMean, RegionOrder, TrendPoint,
    CITYWIDE_LABEL, OTHER_LABEL, SELECTED_LABEL,
};
