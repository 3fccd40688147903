//! Human-facing rendering of rates, conversions and cache state.

pub mod analytics;
pub mod cache;
pub mod rates;
pub mod setup;
pub mod ui;
