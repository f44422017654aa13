pub mod artifacts;
pub mod lighthouse;
pub mod test_results;

pub use test_results::{FileTestResults, StaticTestResults, TestResult, TestResultProvider};
