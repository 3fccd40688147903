//! Domain types and pure logic shared by the service, the tools and the CLI

pub mod analytics;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod error;
pub mod log;
pub mod rates;

pub use error::RateError;
pub use rates::{RateKind, RateRecord, RateSnapshot};
