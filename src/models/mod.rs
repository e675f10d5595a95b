//! Data models for test distribution
//!
//! Value types shared by the protocol, the distributor and the listeners.

mod test_result;
mod test_unit;

pub use test_result::{AbandonedRequest, ErrorEntry, RunSummary, Severity, TestResult};
pub use test_unit::{TestRequest, TestUnit};
