//! Charts module - Chart rendering

mod format;
mod plotter;

pub use plotter::{ChartPlotter, ScatterPoint};
