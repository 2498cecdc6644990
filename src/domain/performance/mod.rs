pub mod snapshot;
pub mod stats;

pub use snapshot::{PerformanceSnapshot, ReturnMode};
pub use stats::Stats;
