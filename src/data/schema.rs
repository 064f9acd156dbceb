//! Schema Module
//! Maps source column names onto the canonical record fields.
//!
//! Each source variant names its columns differently (`계약일`/`연월`/`계약년월`,
//! `거래금액`/`p1`, ...). A mapping lists candidate names per canonical field,
//! and is resolved once against the header of a loaded frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Missing column for {field}: none of {candidates:?} found in {available:?}")]
    MissingColumn {
        field: &'static str,
        candidates: Vec<String>,
        available: Vec<String>,
    },
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Candidate column names for the detail (per-transaction) source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailColumns {
    pub district: Vec<String>,
    pub neighborhood: Vec<String>,
    pub complex_name: Vec<String>,
    pub floor_area: Vec<String>,
    pub contract_period: Vec<String>,
    pub deal_amount: Vec<String>,
}

impl Default for DetailColumns {
    fn default() -> Self {
        Self {
            district: names(&["자치구", "구"]),
            neighborhood: names(&["법정동", "동"]),
            complex_name: names(&["단지명"]),
            floor_area: names(&["전용면적", "전용면적(㎡)"]),
            contract_period: names(&["계약년월", "계약일", "연월"]),
            deal_amount: names(&["거래금액", "거래금액(만원)", "p1"]),
        }
    }
}

/// Candidate column names for the summary (monthly mean) source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryColumns {
    pub district: Vec<String>,
    pub neighborhood: Vec<String>,
    pub period: Vec<String>,
    pub mean_price: Vec<String>,
    pub mean_price_per_area: Vec<String>,
}

impl Default for SummaryColumns {
    fn default() -> Self {
        Self {
            district: names(&["자치구", "구"]),
            neighborhood: names(&["법정동", "동"]),
            period: names(&["연월", "계약년월"]),
            mean_price: names(&["p1", "평균가격"]),
            mean_price_per_area: names(&["p2", "평당가격"]),
        }
    }
}

/// Detail columns as found in one concrete source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDetail {
    pub district: String,
    pub neighborhood: String,
    pub complex_name: Option<String>,
    pub floor_area: String,
    pub contract_period: String,
    pub deal_amount: String,
}

/// Summary columns as found in one concrete source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSummary {
    pub district: String,
    pub neighborhood: String,
    pub period: String,
    pub mean_price: String,
    pub mean_price_per_area: String,
}

/// Header cells sometimes carry a UTF-8 BOM or stray padding.
fn normalize_header(name: &str) -> &str {
    name.trim_start_matches('\u{feff}').trim()
}

/// First candidate present in the header, returned with the header's own spelling.
fn pick(candidates: &[String], available: &[String]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        available
            .iter()
            .find(|col| normalize_header(col) == candidate.trim())
            .cloned()
    })
}

fn require(
    field: &'static str,
    candidates: &[String],
    available: &[String],
) -> Result<String, SchemaError> {
    pick(candidates, available).ok_or_else(|| SchemaError::MissingColumn {
        field,
        candidates: candidates.to_vec(),
        available: available.to_vec(),
    })
}

impl DetailColumns {
    pub fn resolve(&self, available: &[String]) -> Result<ResolvedDetail, SchemaError> {
        Ok(ResolvedDetail {
            district: require("district", &self.district, available)?,
            neighborhood: require("neighborhood", &self.neighborhood, available)?,
            complex_name: pick(&self.complex_name, available),
            floor_area: require("floor_area", &self.floor_area, available)?,
            contract_period: require("contract_period", &self.contract_period, available)?,
            deal_amount: require("deal_amount", &self.deal_amount, available)?,
        })
    }
}

impl SummaryColumns {
    pub fn resolve(&self, available: &[String]) -> Result<ResolvedSummary, SchemaError> {
        Ok(ResolvedSummary {
            district: require("district", &self.district, available)?,
            neighborhood: require("neighborhood", &self.neighborhood, available)?,
            period: require("period", &self.period, available)?,
            mean_price: require("mean_price", &self.mean_price, available)?,
            mean_price_per_area: require(
                "mean_price_per_area",
                &self.mean_price_per_area,
                available,
            )?,
        })
    }
}
