//! Performance regression detection: gather the latest metric artifacts,
//! diff them against a stored baseline and roll the baseline forward when the
//! run is clean.

pub mod baseline;
pub mod config;
pub mod detector;
pub mod error;
pub mod git;
pub mod report;
pub mod snapshot;
pub mod sources;
pub mod storage;

pub use detector::RegressionDetector;
pub use error::{PerfWatchError, Result};
