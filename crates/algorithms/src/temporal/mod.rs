//! Temporal analysis: yearly index series over a region

mod series;

pub use series::{year_series, YearSeries, YearValue};
